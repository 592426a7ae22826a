// src/player.rs
//! Player - replays recorded history entries onto the raster.
//!
//! Entries in the requested range become tracks. Sequential playback paints
//! one frame of one track per due tick and moves to the next track once the
//! current one runs out. Forward playback paints each entry's fill color;
//! reverse playback walks entries newest first and frames last first, painting
//! blank colors back.
//!
//! Simultaneous playback paints the next frame of every unfinished track on
//! each due tick. Since tracks interleave, every pixel is painted only by the
//! newest entry in the range that filled it. Forward, that entry's fill color
//! wins. Reverse, the pixel gets the blank color of the oldest entry in the
//! range that filled it, which is what it held before the range was played.
//! Entries left owning no pixel are skipped.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::*;

use crate::color::Rgba;
use crate::display::Surface;
use crate::error::{FillError, FillResult};
use crate::history::History;
use crate::raster::{Pixel, RasterBuffer};
use crate::scheduler::pacer::Pacer;

/// Which entries to play and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRequest {
    pub start: usize,
    pub end: usize,
    pub simultaneous: bool,
    pub reverse: bool,
}

impl PlayRequest {
    pub fn new(start: usize, end: usize, simultaneous: bool, reverse: bool) -> Self {
        Self {
            start,
            end,
            simultaneous,
            reverse,
        }
    }

    /// Undo of the entry at `cursor`.
    pub fn undo(cursor: usize) -> Self {
        Self::new(cursor, cursor, false, true)
    }

    /// Redo of the entry at `index`.
    pub fn redo(index: usize) -> Self {
        Self::new(index, index, false, false)
    }

    /// History cursor once the playback has completed.
    pub fn final_cursor(&self) -> Option<usize> {
        if self.reverse {
            self.start.checked_sub(1)
        } else {
            Some(self.end)
        }
    }
}

#[derive(Debug)]
pub enum PlayerStatus {
    Pending,
    Finished(PlaySummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaySummary {
    pub request: PlayRequest,
    pub frames_painted: usize,
    pub pixels_painted: usize,
    /// Entries left out because newer entries in the range cover all of
    /// their pixels.
    pub skipped: Vec<usize>,
    pub cursor: Option<usize>,
    pub elapsed: Duration,
}

/// Newest entry in the range that filled a pixel, and the color playback
/// leaves there.
#[derive(Debug, Clone, Copy)]
struct Claim {
    owner: usize,
    color: Rgba,
}

/// Resolve every pixel filled within `start..=end` to its [`Claim`].
fn claim_pixels(history: &History, request: &PlayRequest) -> HashMap<Pixel, Claim> {
    let mut claims: HashMap<Pixel, Claim> = HashMap::new();
    for index in request.start..=request.end {
        let Some(entry) = history.get(index) else {
            continue;
        };
        for pixel in entry.filled_pixels() {
            claims
                .entry(pixel)
                .and_modify(|claim| {
                    claim.owner = index;
                    if !request.reverse {
                        claim.color = entry.fill;
                    }
                })
                .or_insert(Claim {
                    owner: index,
                    color: if request.reverse { entry.blank } else { entry.fill },
                });
        }
    }
    claims
}

#[derive(Debug)]
struct Track {
    entry: usize,
    color: Rgba,
    frame_count: usize,
    played: usize,
}

impl Track {
    fn is_done(&self) -> bool {
        self.played >= self.frame_count
    }

    /// Index of the next frame to paint in the entry's frame list.
    fn next_frame(&self, reverse: bool) -> usize {
        if reverse {
            self.frame_count - 1 - self.played
        } else {
            self.played
        }
    }
}

pub struct Player {
    request: PlayRequest,
    tracks: Vec<Track>,
    /// Track sequential playback is on.
    active: usize,
    skipped: Vec<usize>,
    /// Pixel ownership, built for simultaneous playback only.
    claims: Option<HashMap<Pixel, Claim>>,
    pacer: Pacer,
    started: Instant,
    frames_painted: usize,
    pixels_painted: usize,
}

impl Player {
    /// Validate `request` against `history` and lay out the tracks.
    ///
    /// Simultaneous playback recomputes overwrite marks over the range first;
    /// nothing else touches the history.
    pub fn start(
        request: PlayRequest,
        history: &mut History,
        fps: u32,
        now: Instant,
    ) -> FillResult<Self> {
        history.check_range(request.start, request.end)?;

        let claims = if request.simultaneous {
            let overwritten = history.detect_overwrites_within(request.start, request.end);
            let claims = claim_pixels(history, &request);
            trace!(
                "Player: {} pixels claimed, {} entries overwritten",
                claims.len(),
                overwritten
            );
            Some(claims)
        } else {
            None
        };

        let order: Vec<usize> = if request.reverse {
            (request.start..=request.end).rev().collect()
        } else {
            (request.start..=request.end).collect()
        };

        let mut tracks = Vec::with_capacity(order.len());
        let mut skipped = Vec::new();
        for index in order {
            let Some(entry) = history.get(index) else {
                return Err(FillError::InvalidRange {
                    start: request.start,
                    end: request.end,
                    len: history.len(),
                });
            };
            if let Some(claims) = &claims {
                let owns_any = entry
                    .filled_pixels()
                    .any(|pixel| claims.get(&pixel).is_some_and(|c| c.owner == index));
                if !owns_any {
                    skipped.push(index);
                    continue;
                }
            }
            let color = if request.reverse { entry.blank } else { entry.fill };
            tracks.push(Track {
                entry: index,
                color,
                frame_count: entry.frames.len(),
                played: 0,
            });
        }

        debug!(
            "Player: {} {} playback of {}..={} ({} tracks, {} skipped)",
            if request.simultaneous { "simultaneous" } else { "sequential" },
            if request.reverse { "reverse" } else { "forward" },
            request.start,
            request.end,
            tracks.len(),
            skipped.len()
        );

        Ok(Self {
            request,
            tracks,
            active: 0,
            skipped,
            claims,
            pacer: Pacer::new(fps, now),
            started: now,
            frames_painted: 0,
            pixels_painted: 0,
        })
    }

    pub fn request(&self) -> PlayRequest {
        self.request
    }

    pub fn time_to_due(&self, now: Instant) -> Option<Duration> {
        self.pacer.remaining(now)
    }

    fn is_done(&self) -> bool {
        self.tracks.iter().all(Track::is_done)
    }

    /// Paint the next frame (or frames) once due.
    pub fn tick(
        &mut self,
        now: Instant,
        history: &History,
        raster: &mut RasterBuffer,
        surface: &mut dyn Surface,
    ) -> FillResult<PlayerStatus> {
        if self.is_done() {
            return Ok(PlayerStatus::Finished(self.finish(now)));
        }
        if !self.pacer.is_due(now) {
            return Ok(PlayerStatus::Pending);
        }

        let reverse = self.request.reverse;
        let mut damage: Vec<Pixel> = Vec::new();
        if self.request.simultaneous {
            let claims = self.claims.as_ref();
            for track in self.tracks.iter_mut().filter(|t| !t.is_done()) {
                paint_track_frame(track, reverse, claims, history, raster, &mut damage);
            }
        } else {
            while let Some(track) = self.tracks.get_mut(self.active) {
                if track.is_done() {
                    self.active += 1;
                    continue;
                }
                paint_track_frame(track, reverse, None, history, raster, &mut damage);
                break;
            }
        }

        self.frames_painted += 1;
        self.pixels_painted += damage.len();
        surface.present(raster, &damage).map_err(FillError::Surface)?;

        if self.is_done() {
            return Ok(PlayerStatus::Finished(self.finish(now)));
        }
        self.pacer.frame_painted(now);
        Ok(PlayerStatus::Pending)
    }

    fn finish(&mut self, now: Instant) -> PlaySummary {
        let elapsed = now.saturating_duration_since(self.started);
        info!(
            "Player: done in {} ms ({} frames, {} pixels)",
            elapsed.as_millis(),
            self.frames_painted,
            self.pixels_painted
        );
        PlaySummary {
            request: self.request,
            frames_painted: self.frames_painted,
            pixels_painted: self.pixels_painted,
            skipped: self.skipped.clone(),
            cursor: self.request.final_cursor(),
            elapsed,
        }
    }
}

/// Paint the track's next frame. With `claims`, only the pixels the track owns
/// are painted, each in its claimed color.
fn paint_track_frame(
    track: &mut Track,
    reverse: bool,
    claims: Option<&HashMap<Pixel, Claim>>,
    history: &History,
    raster: &mut RasterBuffer,
    damage: &mut Vec<Pixel>,
) {
    let frame = history
        .get(track.entry)
        .and_then(|entry| entry.frames.get(track.next_frame(reverse)));
    track.played += 1;
    let Some(frame) = frame else {
        warn!("Player: entry {} lost a frame during playback", track.entry);
        return;
    };
    let Some(claims) = claims else {
        raster.paint(&frame.filled, track.color);
        damage.extend_from_slice(&frame.filled);
        return;
    };
    for &pixel in &frame.filled {
        if let Some(claim) = claims.get(&pixel).filter(|c| c.owner == track.entry) {
            raster.put(pixel, claim.color);
            damage.push(pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::HeadlessSurface;
    use crate::history::RecordedFrame;

    const RED: Rgba = Rgba::new(255, 0, 0, 255);
    const BLUE: Rgba = Rgba::new(0, 0, 255, 255);

    fn frames(rows: &[&[u32]]) -> Vec<RecordedFrame> {
        rows.iter()
            .map(|xs| RecordedFrame {
                shore: Vec::new(),
                filled: xs.iter().map(|&x| Pixel::new(x, 0)).collect(),
            })
            .collect()
    }

    fn run(player: &mut Player, history: &History, raster: &mut RasterBuffer) -> PlaySummary {
        let mut surface = HeadlessSurface::new();
        let now = Instant::now();
        for _ in 0..100 {
            if let PlayerStatus::Finished(summary) =
                player.tick(now, history, raster, &mut surface).unwrap()
            {
                return summary;
            }
        }
        panic!("playback never finished");
    }

    #[test_log::test]
    fn final_cursor_follows_direction() {
        let forward = PlayRequest::new(1, 3, false, false);
        assert_eq!(forward.final_cursor(), Some(3));
        let reverse = PlayRequest { reverse: true, ..forward };
        assert_eq!(reverse.final_cursor(), Some(0));
        assert_eq!(PlayRequest::undo(0).final_cursor(), None);
    }

    #[test_log::test]
    fn rejects_bad_ranges_before_painting() {
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0]]), RED, Rgba::WHITE);
        let now = Instant::now();
        let bad = PlayRequest::new(0, 1, false, false);
        assert!(matches!(
            Player::start(bad, &mut history, 0, now),
            Err(FillError::InvalidRange { .. })
        ));
        let reversed = PlayRequest::new(1, 0, false, false);
        assert!(Player::start(reversed, &mut history, 0, now).is_err());
    }

    #[test_log::test]
    fn sequential_forward_paints_one_frame_per_tick() {
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0], &[1, 2]]), RED, Rgba::WHITE);
        history.record(Pixel::new(5, 0), frames(&[&[5]]), BLUE, Rgba::WHITE);
        let mut raster = RasterBuffer::filled(8, 1, Rgba::WHITE);

        let request = PlayRequest::new(0, 1, false, false);
        let mut player = Player::start(request, &mut history, 0, Instant::now()).unwrap();
        let summary = run(&mut player, &history, &mut raster);

        assert_eq!(summary.frames_painted, 3);
        assert_eq!(summary.pixels_painted, 4);
        assert_eq!(summary.cursor, Some(1));
        assert_eq!(raster.get(Pixel::new(2, 0)), Some(RED));
        assert_eq!(raster.get(Pixel::new(5, 0)), Some(BLUE));
        assert_eq!(raster.get(Pixel::new(3, 0)), Some(Rgba::WHITE));
    }

    #[test_log::test]
    fn simultaneous_paints_all_tracks_each_tick() {
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0], &[1]]), RED, Rgba::WHITE);
        history.record(Pixel::new(5, 0), frames(&[&[5], &[6], &[7]]), BLUE, Rgba::WHITE);
        let mut raster = RasterBuffer::filled(8, 1, Rgba::WHITE);

        let request = PlayRequest::new(0, 1, true, false);
        let mut player = Player::start(request, &mut history, 0, Instant::now()).unwrap();
        let summary = run(&mut player, &history, &mut raster);

        assert_eq!(summary.frames_painted, 3);
        assert_eq!(summary.pixels_painted, 5);
    }

    #[test_log::test]
    fn simultaneous_reverse_skips_overwritten_entries() {
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0, 1]]), RED, Rgba::WHITE);
        history.record(Pixel::new(0, 0), frames(&[&[0], &[1]]), BLUE, RED);
        let mut raster = RasterBuffer::filled(4, 1, BLUE);

        let request = PlayRequest::new(0, 1, true, true);
        let mut player = Player::start(request, &mut history, 0, Instant::now()).unwrap();
        let summary = run(&mut player, &history, &mut raster);

        assert_eq!(summary.skipped, vec![0]);
        assert_eq!(summary.cursor, None);
        assert_eq!(summary.pixels_painted, 2);
        assert_eq!(raster.get(Pixel::new(0, 0)), Some(Rgba::WHITE));
        assert_eq!(raster.get(Pixel::new(1, 0)), Some(Rgba::WHITE));
    }

    #[test_log::test]
    fn simultaneous_reverse_restores_partial_overlap_per_pixel() {
        // Entry 0 turned 0..=3 from white to red; entry 1 then turned 2..=5
        // from red to blue, where 4 and 5 were red to begin with.
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0, 1], &[2, 3]]), RED, Rgba::WHITE);
        history.record(Pixel::new(2, 0), frames(&[&[2, 3], &[4, 5]]), BLUE, RED);
        let mut raster = RasterBuffer::filled(6, 1, BLUE);
        raster.paint(&[Pixel::new(0, 0), Pixel::new(1, 0)], RED);

        let request = PlayRequest::new(0, 1, true, true);
        let mut player = Player::start(request, &mut history, 0, Instant::now()).unwrap();
        let summary = run(&mut player, &history, &mut raster);

        assert!(summary.skipped.is_empty());
        assert_eq!(summary.pixels_painted, 6);
        for x in 0..4 {
            assert_eq!(raster.get(Pixel::new(x, 0)), Some(Rgba::WHITE), "x = {x}");
        }
        assert_eq!(raster.get(Pixel::new(4, 0)), Some(RED));
        assert_eq!(raster.get(Pixel::new(5, 0)), Some(RED));
    }

    #[test_log::test]
    fn simultaneous_forward_keeps_newest_fill_on_shared_pixels() {
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0], &[1], &[2, 3]]), RED, Rgba::WHITE);
        history.record(Pixel::new(0, 0), frames(&[&[0, 1, 2, 3]]), BLUE, Rgba::WHITE);
        let mut raster = RasterBuffer::filled(4, 1, Rgba::WHITE);

        let request = PlayRequest::new(0, 1, true, false);
        let mut player = Player::start(request, &mut history, 0, Instant::now()).unwrap();
        let summary = run(&mut player, &history, &mut raster);

        assert_eq!(summary.skipped, vec![0]);
        assert_eq!(summary.cursor, Some(1));
        for x in 0..4 {
            assert_eq!(raster.get(Pixel::new(x, 0)), Some(BLUE), "x = {x}");
        }
    }

    #[test_log::test]
    fn paced_playback_waits_for_the_frame_budget() {
        let mut history = History::new();
        history.record(Pixel::new(0, 0), frames(&[&[0], &[1]]), RED, Rgba::WHITE);
        let mut raster = RasterBuffer::filled(2, 1, Rgba::WHITE);
        let mut surface = HeadlessSurface::new();

        let start = Instant::now();
        let mut player = Player::start(PlayRequest::redo(0), &mut history, 10, start).unwrap();
        let due = start + Duration::from_millis(150);
        assert!(matches!(
            player.tick(start, &history, &mut raster, &mut surface).unwrap(),
            PlayerStatus::Pending
        ));
        assert_eq!(surface.stats().presents, 0);
        assert!(matches!(
            player.tick(due, &history, &mut raster, &mut surface).unwrap(),
            PlayerStatus::Pending
        ));
        assert!(matches!(
            player
                .tick(due + Duration::from_millis(100), &history, &mut raster, &mut surface)
                .unwrap(),
            PlayerStatus::Finished(_)
        ));
        assert_eq!(surface.stats().presents, 2);
    }
}
