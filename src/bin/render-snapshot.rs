use anyhow::Result;
use clap::Parser;
use derive_more::Display;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use stylesync_config::storage::JsonStorageAdapter;
use stylesync_config::{config_store, config_store_write};
use stylesync_engine::config::EngineConfig;
use stylesync_engine::inspector::{InspectorHandle, SyntheticTree};
use stylesync_engine::model::Snapshot;
use stylesync_engine::store::StyleStores;
use stylesync_engine::SyncSession;
use stylesync_shared::abort::AbortController;
use stylesync_shared::node::InstanceId;
use stylesync_shared::scheduler::SchedulerHandle;

#[derive(Clone, Copy, Debug, Display, PartialEq, clap::ValueEnum)]
enum Sheet {
    User,
    State,
    Helpers,
    Root,
    All,
}

#[derive(Debug, Parser)]
#[clap(name = "render-snapshot", version = "0.1.0", about = "Renders the stylesheets of a style snapshot")]
struct Cli {
    /// Snapshot json file
    #[clap(required_unless_present = "list_settings")]
    snapshot: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short = 'd', long = "debug")]
    debug: bool,

    #[clap(short = 's', long = "sheet", value_enum, default_value_t = Sheet::All)]
    sheet: Sheet,

    /// Synthetic render tree to run the collapse detector against
    #[clap(short = 'l', long = "layout")]
    layout: Option<PathBuf>,

    /// Json settings file overriding the defaults
    #[clap(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Instance to preview a state for
    #[clap(long = "select")]
    select: Option<String>,

    /// State to preview on the selected instance (`:hover`)
    #[clap(long = "state", requires = "select")]
    state: Option<String>,

    /// List the settings matching the pattern (`collapse.*`) and exit
    #[clap(long = "list-settings", value_name = "PATTERN", num_args = 0..=1, default_missing_value = "*")]
    list_settings: Option<String>,
}

/// One line per known setting matching the pattern: key, current value, description
fn settings_listing(pattern: &str) -> Vec<String> {
    let store = config_store();
    store
        .find(pattern)
        .into_iter()
        .filter_map(|key| {
            let info = store.get_info(&key)?;
            let value = store.get(&key).unwrap_or(info.default);
            Some(format!("{key:40}: {:24} # {}", value.to_string(), info.description))
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Cli::parse();

    SimpleLogger::new()
        .with_level(if args.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .init()?;

    if let Some(path) = &args.config {
        let storage = JsonStorageAdapter::try_from(path.as_path())?;
        config_store_write().set_storage(Box::new(storage));
    }

    if let Some(pattern) = &args.list_settings {
        for line in settings_listing(pattern) {
            println!("{line}");
        }
        return Ok(());
    }

    let Some(path) = &args.snapshot else {
        anyhow::bail!("no snapshot file given");
    };
    let snapshot = Snapshot::load(path)?;
    let stores = StyleStores::from_snapshot(&snapshot);
    stores.selected_instance.set(args.select.as_deref().map(InstanceId::from));
    stores.selected_state.set(args.state.clone());

    let controller = AbortController::new();
    let session = SyncSession::start(
        EngineConfig::from_store(),
        stores,
        SchedulerHandle::new(),
        None,
        &controller.signal(),
    );
    session.set_presets(snapshot.presets.clone());

    let tree = match &args.layout {
        Some(path) => {
            let tree = Rc::new(RefCell::new(SyntheticTree::from_json(&std::fs::read_to_string(path)?)?));
            let inspector: InspectorHandle = tree.clone();
            session.attach_inspector(inspector);
            Some(tree)
        }
        None => None,
    };

    session.flush();

    let sheets = [
        (Sheet::User, session.user_css()),
        (Sheet::State, session.state_css()),
        (Sheet::Helpers, session.helpers_css()),
        (Sheet::Root, session.root_css()),
    ];
    for (sheet, css) in sheets {
        if args.sheet != Sheet::All && args.sheet != sheet {
            continue;
        }
        if args.sheet == Sheet::All {
            println!("/* {sheet} */");
        }
        print!("{css}");
    }

    if let Some(tree) = tree {
        println!("/* collapsed */");
        for (id, flag) in tree.borrow().collapsed() {
            println!("/* {id}: {flag} */");
        }
    }

    controller.abort();
    Ok(())
}
