use std::path::{Path, PathBuf};

use tabled::Table;

use crate::{
    cli::{SourceSelection, aggregate, open_session, print_aggregation_notes},
    Res, error, success,
    types::{GenreBuckets, GenreTableRow},
    utils, warning,
};

pub async fn genres(selection: SourceSelection, output: Option<PathBuf>) {
    let pb = utils::spinner("Connecting to Spotify...");
    let session = open_session(&pb).await;
    let result = aggregate(&session, &selection, &pb).await;
    pb.finish_and_clear();

    print_aggregation_notes(&session, &result);

    if result.buckets.is_empty() {
        warning!("No genres found for the selected sources.");
    } else {
        let mut rows: Vec<GenreTableRow> = result
            .buckets
            .iter()
            .map(|(genre, tracks)| GenreTableRow {
                genre: genre.clone(),
                tracks: tracks.len(),
            })
            .collect();
        utils::sort_genre_table_rows(&mut rows);
        println!("{}", Table::new(rows));
    }

    if let Some(path) = output {
        match write_buckets(&path, &result.buckets).await {
            Ok(()) => success!("Genre buckets written to {}", path.display()),
            Err(e) => error!("Cannot write {}. Err: {}", path.display(), e),
        }
    }
}

async fn write_buckets(path: &Path, buckets: &GenreBuckets) -> Res<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        async_fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(buckets)?;
    async_fs::write(path, json).await?;
    Ok(())
}
