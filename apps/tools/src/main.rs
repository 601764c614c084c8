use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reorder_core::{
    config::{load_settings, prepare_database_url, Settings},
    CommitHandle, ListGeometry, OrderPersistence, PersistenceEvent, ReorderList,
};
use shared::domain::{ItemId, NewRecord, OrderedItem, RecordPatch};
use storage::Storage;
use tokio::{runtime::Handle, time::timeout};
use tracing::info;

const COMMIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "todo", about = "Manage an ordered to-do list")]
struct Cli {
    /// Overrides `database_url` from reorder.toml and the environment.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Add {
        title: String,
        #[arg(long)]
        tag: Option<String>,
    },
    List {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        json: bool,
    },
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_tag")]
        tag: Option<String>,
        #[arg(long)]
        clear_tag: bool,
    },
    Done {
        id: i64,
        /// Marks the item as not done instead.
        #[arg(long)]
        undo: bool,
    },
    Delete {
        id: i64,
    },
    /// Drags `id` to position `index` (0-based) and commits the new order.
    Move {
        id: i64,
        index: usize,
    },
    /// Rewrites order keys to 0..n in the current order.
    Normalize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings();
    let raw_url = cli.database_url.as_deref().unwrap_or(&settings.database_url);
    let database_url = prepare_database_url(raw_url)?;
    let storage = Arc::new(Storage::new(&database_url).await?);

    match cli.command {
        Command::Add { title, tag } => {
            let mut record = NewRecord::new(title);
            record.tag = tag;
            let item = storage.insert(&record).await?;
            println!("created id={} order_key={}", item.id, item.order_key);
        }
        Command::List { tag, json } => {
            let items = match tag.as_deref() {
                Some(tag) => storage.list_by_tag(tag).await?,
                None => storage.list().await?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                print_items(&items);
            }
        }
        Command::Edit {
            id,
            title,
            tag,
            clear_tag,
        } => {
            let patch = RecordPatch {
                title,
                tag: if clear_tag { Some(None) } else { tag.map(Some) },
                done: None,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass --title, --tag or --clear-tag");
            }
            let item = storage
                .update(ItemId(id), &patch)
                .await?
                .with_context(|| format!("no item with id {id}"))?;
            print_items(std::slice::from_ref(&item));
        }
        Command::Done { id, undo } => {
            let patch = RecordPatch {
                done: Some(!undo),
                ..RecordPatch::default()
            };
            storage
                .update(ItemId(id), &patch)
                .await?
                .with_context(|| format!("no item with id {id}"))?;
            println!("item {id} marked {}", if undo { "open" } else { "done" });
        }
        Command::Delete { id } => {
            if !storage.delete(ItemId(id)).await? {
                bail!("no item with id {id}");
            }
            println!("deleted id={id}");
        }
        Command::Move { id, index } => {
            move_item(storage, &settings, ItemId(id), index).await?;
        }
        Command::Normalize => {
            let changed = storage.normalize_order_keys().await?;
            println!("normalized order keys ({changed} changed)");
        }
    }

    Ok(())
}

/// Replays a drag gesture through the same engine the GUI uses: lift the
/// item, move the pointer straight to the target slot, release, then wait for
/// the background commit.
async fn move_item(
    storage: Arc<Storage>,
    settings: &Settings,
    id: ItemId,
    target: usize,
) -> Result<()> {
    let items = storage.list().await?;
    if target >= items.len() {
        bail!("index {target} out of range for {} items", items.len());
    }

    let (handle, task) = CommitHandle::spawn(storage.clone(), settings.commit, &Handle::current());
    let mut events = handle.subscribe();
    let mut list = ReorderList::new(
        items,
        ListGeometry::uniform(settings.row_height),
        settings.spring,
        OrderPersistence::new(handle.clone()),
    );

    if !list.on_drag_start(id) {
        bail!("no item with id {id}");
    }
    let origin = list
        .session()
        .map(|session| session.origin_index)
        .unwrap_or_default();
    if origin == target {
        list.on_drag_cancel();
        println!("item {id} already at index {target}");
        return Ok(());
    }

    let slots = list.geometry().layout(list.sequence());
    list.on_drag_move(slots[target].top - slots[origin].top);
    let landed = list.sequence().position(id);
    if landed != Some(target) {
        list.on_drag_cancel();
        bail!("drag for item {id} landed at {landed:?} instead of {target}");
    }

    let plan = list
        .on_drag_end()
        .context("drag session ended before release")?;
    info!(generation = plan.generation(), "waiting for commit");

    let outcome = timeout(COMMIT_TIMEOUT, async {
        loop {
            match events.recv().await {
                Ok(PersistenceEvent::Retrying { attempt, error, .. }) => {
                    eprintln!("commit attempt {attempt} failed: {error}; retrying");
                }
                Ok(other) => return Ok(other),
                Err(err) => return Err(err),
            }
        }
    })
    .await
    .context("timed out waiting for the commit")?
    .context("commit worker stopped")?;

    handle.shutdown();
    task.await.context("commit worker panicked")?;

    match outcome {
        PersistenceEvent::Committed { .. } => {
            println!("moved item {id} from {origin} to {target}");
            print_items(list.sequence().items());
            Ok(())
        }
        PersistenceEvent::CommitFailed { error, .. } => bail!("order not saved: {error}"),
        other => bail!("unexpected commit event: {other:?}"),
    }
}

fn print_items(items: &[OrderedItem]) {
    for (index, item) in items.iter().enumerate() {
        let mark = if item.done { "x" } else { " " };
        let tag = item
            .tag
            .as_deref()
            .map(|tag| format!(" #{tag}"))
            .unwrap_or_default();
        println!(
            "{index:>3}. [{mark}] {}{tag}  (id={}, key={})",
            item.title, item.id, item.order_key
        );
    }
}
