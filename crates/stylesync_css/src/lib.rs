//! Stylesheet building blocks.
//!
//! Style values are typed ([`value::StyleValue`]), breakpoints map onto media queries
//! ([`media::Breakpoint`]) and [`stylesheet::StyleSheet`] is the imperative sink the engine
//! writes into: media rules, mixin rules holding declarations, and nesting rules that apply
//! mixins to a selector. Nothing is visible until [`stylesheet::StyleSheet::render`] runs.

pub mod media;
pub mod stylesheet;
pub mod value;
