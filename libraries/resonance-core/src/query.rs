//! Read-only queries over a track slice
//!
//! `LibraryIndex` exposes these under its read lock; they are also usable on
//! any snapshot returned by `LibraryIndex::tracks`.

use crate::types::Track;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;

/// How far back "recently added" reaches
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Default size of the most-played list
pub const MOST_PLAYED_LIMIT: usize = 10;

/// Library view filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibraryFilter {
    #[default]
    All,
    Favorites,
    /// Added within the last seven days
    RecentlyAdded,
}

/// Sort order for library listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Ascending, case-insensitive
    #[default]
    Title,
    /// Ascending, case-insensitive
    Artist,
    /// Most played first
    PlayCount,
    /// Newest first
    AddedDate,
}

/// Aggregate library counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LibraryStats {
    pub total_tracks: usize,
    pub favorites: usize,
    pub total_plays: u64,
    pub total_duration: Duration,
}

impl LibraryStats {
    pub fn collect(tracks: &[Track]) -> Self {
        tracks.iter().fold(Self::default(), |mut stats, track| {
            stats.total_tracks += 1;
            if track.favorite {
                stats.favorites += 1;
            }
            stats.total_plays += u64::from(track.play_count);
            stats.total_duration += track.duration();
            stats
        })
    }
}

pub fn search(tracks: &[Track], text: &str) -> Vec<Track> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return tracks.to_vec();
    }
    tracks
        .iter()
        .filter(|t| {
            t.title.to_lowercase().contains(&needle)
                || t.artist.to_lowercase().contains(&needle)
                || t.album.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

pub fn filter(tracks: &[Track], filter: LibraryFilter, now: DateTime<Utc>) -> Vec<Track> {
    let cutoff = now - ChronoDuration::days(RECENT_WINDOW_DAYS);
    tracks
        .iter()
        .filter(|t| match filter {
            LibraryFilter::All => true,
            LibraryFilter::Favorites => t.favorite,
            LibraryFilter::RecentlyAdded => t.added_at >= cutoff,
        })
        .cloned()
        .collect()
}

pub fn sorted(tracks: &[Track], key: SortKey) -> Vec<Track> {
    let mut out = tracks.to_vec();
    out.sort_by(|a, b| compare(a, b, key));
    out
}

/// Played tracks only, highest count first
pub fn most_played(tracks: &[Track], limit: usize) -> Vec<Track> {
    let mut played: Vec<Track> = tracks.iter().filter(|t| t.play_count > 0).cloned().collect();
    played.sort_by(|a, b| compare(a, b, SortKey::PlayCount));
    played.truncate(limit);
    played
}

pub fn recently_added(tracks: &[Track], limit: usize) -> Vec<Track> {
    let mut out = sorted(tracks, SortKey::AddedDate);
    out.truncate(limit);
    out
}

fn compare(a: &Track, b: &Track, key: SortKey) -> Ordering {
    match key {
        SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortKey::Artist => a.artist.to_lowercase().cmp(&b.artist.to_lowercase()),
        SortKey::PlayCount => b.play_count.cmp(&a.play_count),
        SortKey::AddedDate => b.added_at.cmp(&a.added_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn track(id: &str, title: &str, artist: &str, album: &str) -> Track {
        Track::new(title, artist, album, format!("/music/{id}.mp3")).with_id(id)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn fixture() -> Vec<Track> {
        let mut a = track("a", "Bohemian Rhapsody", "Queen", "A Night at the Opera");
        a.play_count = 5;
        a.favorite = true;
        a.added_at = now() - ChronoDuration::days(30);

        let mut b = track("b", "airbag", "Radiohead", "OK Computer");
        b.play_count = 12;
        b.added_at = now() - ChronoDuration::days(2);

        let mut c = track("c", "Clair de Lune", "Debussy", "Suite bergamasque");
        c.added_at = now() - ChronoDuration::days(8);

        vec![a, b, c]
    }

    #[test]
    fn search_is_case_insensitive_across_fields() {
        let tracks = fixture();
        assert_eq!(search(&tracks, "QUEEN").len(), 1);
        assert_eq!(search(&tracks, "computer")[0].id.as_str(), "b");
        assert_eq!(search(&tracks, "de lune")[0].id.as_str(), "c");
        assert_eq!(search(&tracks, "  ").len(), 3);
        assert!(search(&tracks, "zzz").is_empty());
    }

    #[test]
    fn filter_favorites_and_recent() {
        let tracks = fixture();
        let favorites = filter(&tracks, LibraryFilter::Favorites, now());
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id.as_str(), "a");

        let recent = filter(&tracks, LibraryFilter::RecentlyAdded, now());
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id.as_str(), "b");

        assert_eq!(filter(&tracks, LibraryFilter::All, now()).len(), 3);
    }

    #[test]
    fn sort_orders() {
        let tracks = fixture();
        let ids = |v: Vec<Track>| v.into_iter().map(|t| t.id.to_string()).collect::<Vec<_>>();

        assert_eq!(ids(sorted(&tracks, SortKey::Title)), ["b", "a", "c"]);
        assert_eq!(ids(sorted(&tracks, SortKey::Artist)), ["c", "a", "b"]);
        assert_eq!(ids(sorted(&tracks, SortKey::PlayCount)), ["b", "a", "c"]);
        assert_eq!(ids(sorted(&tracks, SortKey::AddedDate)), ["b", "c", "a"]);
    }

    #[test]
    fn most_played_skips_unplayed() {
        let tracks = fixture();
        let top = most_played(&tracks, MOST_PLAYED_LIMIT);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id.as_str(), "b");

        assert_eq!(most_played(&tracks, 1).len(), 1);
    }

    #[test]
    fn stats_totals() {
        let mut tracks = fixture();
        tracks[0].duration_ms = 1_000;
        tracks[1].duration_ms = 2_500;

        let stats = LibraryStats::collect(&tracks);
        assert_eq!(stats.total_tracks, 3);
        assert_eq!(stats.favorites, 1);
        assert_eq!(stats.total_plays, 17);
        assert_eq!(stats.total_duration, Duration::from_millis(3_500));
    }
}
