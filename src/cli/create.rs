use std::sync::atomic::{AtomicUsize, Ordering};

use tabled::Table;

use crate::{
    cli::{SourceSelection, aggregate, fail, open_session, print_aggregation_notes},
    info,
    pipeline::{BulkCreator, BulkOptions},
    success,
    types::{BulkCreationReport, BulkCreationResult, BulkResultTableRow, GenreBuckets},
    utils, warning,
};

pub async fn create(selection: SourceSelection, skip_duplicates: bool, public: bool) {
    let pb = utils::spinner("Connecting to Spotify...");
    let session = open_session(&pb).await;
    let result = aggregate(&session, &selection, &pb).await;
    pb.finish_and_clear();

    print_aggregation_notes(&session, &result);

    let total = result.buckets.len();
    if total == 0 {
        warning!("No genres left to create playlists for.");
        return;
    }
    info!("Creating playlists for {} genres...", total);

    let options = BulkOptions {
        skip_duplicates,
        public,
        user_playlists_page_size: session.config.user_playlists_page_size,
        add_tracks_chunk_size: session.config.add_tracks_chunk_size,
        ..Default::default()
    };

    let pb = utils::spinner("Creating playlists...");
    let done = AtomicUsize::new(0);
    let progress_pb = pb.clone();
    let progress = move |r: &BulkCreationResult| {
        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
        progress_pb.set_message(format!("[{}/{}] {}", n, total, r.genre));
    };

    let creator = BulkCreator::new(&session.client, options).on_progress(&progress);
    let report = match creator.create_bulk(&result.buckets).await {
        Ok(report) => report,
        Err(e) => {
            pb.finish_and_clear();
            if let Some(partial) = e.partial_report() {
                print_report(partial, &result.buckets);
            }
            fail(e);
        }
    };
    pb.finish_and_clear();
    print_report(&report, &result.buckets);
}

fn print_report(report: &BulkCreationReport, buckets: &GenreBuckets) {
    let rows: Vec<BulkResultTableRow> = report
        .results
        .iter()
        .map(|r| {
            let (status, details) = if r.success {
                let tracks = buckets.get(&r.genre).map_or(0, |t| t.len());
                let link = r
                    .playlist_url
                    .clone()
                    .or_else(|| r.playlist_id.clone())
                    .unwrap_or_default();
                ("created", format!("{} tracks, {}", tracks, link))
            } else if r.skipped {
                ("skipped", "playlist already exists".to_string())
            } else {
                ("failed", r.error.clone().unwrap_or_default())
            };
            BulkResultTableRow {
                genre: r.genre.clone(),
                status: status.to_string(),
                details,
            }
        })
        .collect();
    println!("{}", Table::new(rows));

    let summary = &report.summary;
    if summary.failed == 0 {
        success!(
            "Created {} playlists, skipped {}.",
            summary.successful,
            summary.skipped
        );
    } else {
        warning!(
            "Created {} playlists, skipped {}, {} failed.",
            summary.successful,
            summary.skipped,
            summary.failed
        );
    }
}
