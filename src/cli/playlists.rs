use tabled::Table;

use crate::{
    cli::{fail, open_session},
    info,
    spotify::SpotifyApi,
    types::{Playlist, PlaylistTableRow},
    utils,
};

pub async fn playlists() {
    let pb = utils::spinner("Fetching your playlists...");
    let session = open_session(&pb).await;

    let limit = session.config.user_playlists_page_size.max(1);
    let mut offset = 0;
    let mut playlists: Vec<Playlist> = Vec::new();

    loop {
        let page = match session.client.user_playlists(offset, limit).await {
            Ok(page) => page,
            Err(e) => {
                pb.finish_and_clear();
                fail(e);
            }
        };

        let fetched = page.items.len() as u32;
        playlists.extend(page.items);
        pb.set_message(format!("Fetched {} of {} playlists...", playlists.len(), page.total));

        if page.next.is_none() || fetched == 0 {
            break;
        }
        offset += fetched;
    }
    pb.finish_and_clear();

    if playlists.is_empty() {
        info!("You have no playlists yet.");
        return;
    }

    let rows: Vec<PlaylistTableRow> = playlists
        .into_iter()
        .map(|p| PlaylistTableRow {
            tracks: p
                .tracks
                .map(|t| t.total.to_string())
                .unwrap_or_else(|| "-".to_string()),
            name: p.name,
            id: p.id,
        })
        .collect();
    let count = rows.len();

    println!("{}", Table::new(rows));
    info!("{} playlists.", count);
}
