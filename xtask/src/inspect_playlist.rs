//! xtask inspect-playlist - decode a `config.bin` record from a card.

use std::path::Path;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use platform::storage::{join_path, Storage};
use platform::storage_local::LocalFileStorage;
use playlist::record::{RecordDecoder, MAGIC_FLAT, MAGIC_LEN, MAGIC_NESTED};
use playlist::{Layout, PhotoReference, PlaylistConfig, PlaylistRecord, MAX_PHOTOS};

/// Entry point called from main.rs
pub fn run(record_path: &Path, card: Option<&Path>) -> Result<()> {
    let bytes = std::fs::read(record_path).with_context(|| format!("reading {}", record_path.display()))?;
    let record = decode(&bytes)?;

    println!();
    println!("{}", format!("Playlist record {}", record_path.display()).cyan().bold());
    println!("  layout : {:?}", record.layout());
    println!("  photos : {}", record.count());
    println!("  cursor : {}", record.cursor());
    println!();

    let names = match card {
        Some(root) => Some(resolve_names(root, &record)?),
        None => None,
    };

    for (i, reference) in record.entries().iter().enumerate() {
        let marker = if i == usize::from(record.cursor()) { ">" } else { " " };
        let locator = match reference {
            PhotoReference::Flat(loc) => format!("{loc}"),
            PhotoReference::Nested { dir, file } => format!("{dir}/{file}"),
        };
        let name = names.as_ref().and_then(|n| n.get(i)).map_or(String::new(), |n| match n {
            Some(path) => path.clone(),
            None => "(stale)".red().to_string(),
        });
        println!("{marker} {i:>5}  {locator:<11} {name}");
    }
    println!();
    Ok(())
}

/// Decode a record in whichever layout its magic announces.
pub(crate) fn decode(bytes: &[u8]) -> Result<Box<PlaylistRecord<MAX_PHOTOS>>> {
    let layout = match bytes.get(..MAGIC_LEN) {
        Some(m) if m == MAGIC_FLAT => Layout::Flat,
        Some(m) if m == MAGIC_NESTED => Layout::Nested,
        _ if bytes.is_empty() => bail!("record is empty (invalidated)"),
        _ => bail!("unrecognised record magic"),
    };
    let mut record = Box::new(PlaylistRecord::new(layout));
    let mut decoder = RecordDecoder::new(&mut *record, layout);
    decoder.feed(bytes).map_err(|e| anyhow::anyhow!("invalid record: {e:?}"))?;
    decoder.finish().map_err(|e| anyhow::anyhow!("invalid record: {e:?}"))?;
    Ok(record)
}

/// Look every entry up on the card rooted at `root`; `None` marks a locator
/// that no longer names a file.
fn resolve_names(root: &Path, record: &PlaylistRecord<MAX_PHOTOS>) -> Result<Vec<Option<String>>> {
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let config = PlaylistConfig::default();
    runtime.block_on(async {
        let mut storage = LocalFileStorage::new(root);
        storage.mount().await.map_err(|e| anyhow::anyhow!("card root unusable: {e}"))?;
        let photo_dir = config.photo_dir.as_str();
        let mut names = Vec::with_capacity(record.entries().len());
        for reference in record.entries() {
            let name = match *reference {
                PhotoReference::Flat(loc) => lookup(&mut storage, photo_dir, loc, false).await?,
                PhotoReference::Nested { dir, file } => match lookup(&mut storage, photo_dir, dir, true).await? {
                    Some(sub) => lookup(&mut storage, &sub, file, false).await?,
                    None => None,
                },
            };
            names.push(name);
        }
        Ok(names)
    })
}

async fn lookup(storage: &mut LocalFileStorage, dir: &str, locator: u16, want_dir: bool) -> Result<Option<String>> {
    let entry = storage.entry_at(dir, locator).await?;
    Ok(entry
        .filter(|e| e.is_dir == want_dir)
        .and_then(|e| join_path(dir, &e.name))
        .map(|p| p.as_str().to_owned()))
}
