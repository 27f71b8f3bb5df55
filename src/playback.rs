//! Simulated playback overlay.
//!
//! There is no media here: a movie's runtime becomes a duration in seconds and a
//! one-second ticker walks the clock up to it. [`PlaybackState`] is the pure
//! state machine; [`PlaybackSession`] owns the ticker and publishes snapshots
//! over a `watch` channel.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::images;
use crate::models::MovieDetail;
use crate::tmdb::TmdbApi;

pub const TICK: Duration = Duration::from_secs(1);
pub const NOT_FOUND_MESSAGE: &str = "Movie not found.";
pub const BAD_RUNTIME_MESSAGE: &str = "Movie runtime is out of range.";
/// Untouched sessions are released after this long, whatever their phase.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(10 * 60);
/// Ended or failed sessions are released once untouched for this long.
pub const FINISHED_SESSION_GRACE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Playing,
    Paused,
    Ended,
    /// Metadata could not be fetched. Terminal apart from `Closed`.
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub movie_id: u64,
    pub title: Option<String>,
    pub backdrop_url: Option<String>,
    pub phase: Phase,
    /// Seconds.
    pub duration: u32,
    /// Seconds, never above `duration`.
    pub current_time: u32,
    /// Percent of `duration` elapsed.
    pub progress: f64,
    pub playing: bool,
    pub fullscreen: bool,
    pub error: Option<String>,
}

impl PlaybackState {
    pub fn loading(movie_id: u64) -> Self {
        Self {
            movie_id,
            title: None,
            backdrop_url: None,
            phase: Phase::Loading,
            duration: 0,
            current_time: 0,
            progress: 0.0,
            playing: false,
            fullscreen: false,
            error: None,
        }
    }

    /// Metadata arrived: derive the duration and autoplay.
    pub fn ready(&mut self, detail: &MovieDetail) {
        if self.phase != Phase::Loading {
            return;
        }
        let Some(duration) = detail.duration_seconds() else {
            self.fail(BAD_RUNTIME_MESSAGE);
            return;
        };
        self.title = Some(detail.summary.title.clone());
        self.backdrop_url = Some(images::image_url(
            detail.summary.backdrop_path.as_deref(),
            images::POSTER_SIZE,
        ));
        self.duration = duration;
        self.current_time = 0;
        self.progress = 0.0;
        self.playing = true;
        self.phase = Phase::Playing;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if self.phase != Phase::Loading {
            return;
        }
        self.error = Some(message.into());
        self.playing = false;
        self.phase = Phase::Failed;
    }

    /// Advances the clock by one second. Returns whether the clock should keep running.
    pub fn tick(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        let next = self.current_time.saturating_add(1);
        if next >= self.duration {
            self.current_time = self.duration;
            self.progress = 100.0;
            self.playing = false;
            self.phase = Phase::Ended;
            return false;
        }
        self.current_time = next;
        self.progress = f64::from(next) / f64::from(self.duration) * 100.0;
        true
    }

    /// Play/pause. Does nothing outside `Playing`/`Paused`.
    pub fn toggle_play(&mut self) {
        match self.phase {
            Phase::Playing => {
                self.phase = Phase::Paused;
                self.playing = false;
            }
            Phase::Paused => {
                self.phase = Phase::Playing;
                self.playing = true;
            }
            _ => {}
        }
    }

    pub fn toggle_fullscreen(&mut self) -> bool {
        self.fullscreen = !self.fullscreen;
        self.fullscreen
    }

    /// Mirrors a fullscreen change made outside the overlay, e.g. the Escape key.
    pub fn sync_fullscreen(&mut self, fullscreen: bool) {
        self.fullscreen = fullscreen;
    }

    pub fn close(&mut self) {
        self.playing = false;
        self.fullscreen = false;
        self.phase = Phase::Closed;
    }

    pub fn is_ticking(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Ended | Phase::Failed | Phase::Closed)
    }

    /// `MM:SS / MM:SS`, as printed next to the progress bar.
    pub fn clock_label(&self) -> String {
        format!(
            "{} / {}",
            format_clock(self.current_time),
            format_clock(self.duration)
        )
    }
}

/// Minutes are not wrapped into hours: 2h05m shows as `125:00`.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// One open playback overlay and the ticker driving it.
///
/// The ticker is aborted on pause, close and drop, and it exits by itself once
/// the movie ends, so no callback outlives the session.
pub struct PlaybackSession {
    updates: Arc<watch::Sender<PlaybackState>>,
    ticker: Option<JoinHandle<()>>,
}

impl PlaybackSession {
    /// Fetches metadata for `movie_id` and starts playing, or lands in `Failed`.
    pub async fn open(tmdb: &dyn TmdbApi, movie_id: u64) -> Self {
        let (tx, _rx) = watch::channel(PlaybackState::loading(movie_id));
        let mut session = Self {
            updates: Arc::new(tx),
            ticker: None,
        };
        match tmdb.fetch_movie_detail(movie_id).await {
            Ok(detail) => session.start(&detail),
            Err(e) => {
                warn!("Failed to fetch movie {} for playback: {}", movie_id, e);
                session.updates.send_modify(|s| s.fail(NOT_FOUND_MESSAGE));
            }
        }
        session
    }

    /// Starts a session straight from metadata already in hand.
    pub fn from_detail(detail: &MovieDetail) -> Self {
        let (tx, _rx) = watch::channel(PlaybackState::loading(detail.summary.id));
        let mut session = Self {
            updates: Arc::new(tx),
            ticker: None,
        };
        session.start(detail);
        session
    }

    fn start(&mut self, detail: &MovieDetail) {
        self.updates.send_modify(|s| s.ready(detail));
        info!(
            movie_id = detail.summary.id,
            duration = self.updates.borrow().duration,
            "Playback started"
        );
        self.sync_ticker();
    }

    pub fn snapshot(&self) -> PlaybackState {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.updates.subscribe()
    }

    pub fn toggle_play(&mut self) -> PlaybackState {
        self.updates.send_modify(|s| s.toggle_play());
        self.sync_ticker();
        self.snapshot()
    }

    pub fn toggle_fullscreen(&mut self) -> PlaybackState {
        self.updates.send_modify(|s| {
            s.toggle_fullscreen();
        });
        self.snapshot()
    }

    pub fn sync_fullscreen(&mut self, fullscreen: bool) -> PlaybackState {
        self.updates.send_modify(|s| s.sync_fullscreen(fullscreen));
        self.snapshot()
    }

    pub fn close(&mut self) -> PlaybackState {
        self.stop_ticker();
        self.updates.send_modify(|s| s.close());
        debug!(movie_id = self.updates.borrow().movie_id, "Playback closed");
        self.snapshot()
    }

    /// Whether a ticker task is alive right now.
    pub fn has_running_timer(&self) -> bool {
        self.ticker.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn sync_ticker(&mut self) {
        if self.updates.borrow().is_ticking() {
            if !self.has_running_timer() {
                self.ticker = Some(spawn_ticker(self.updates.clone()));
            }
        } else {
            self.stop_ticker();
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

struct Tracked {
    session: PlaybackSession,
    touched: Instant,
}

/// Open overlays by session id.
///
/// Nothing is kept forever: [`SessionRegistry::sweep`] drops sessions that
/// finished and went quiet, and any session nobody has looked at for the idle
/// TTL. Dropping a session aborts its ticker.
pub struct SessionRegistry {
    sessions: HashMap<u64, Tracked>,
    next_id: u64,
    idle_ttl: Duration,
    finished_grace: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SESSION_IDLE_TTL, FINISHED_SESSION_GRACE)
    }
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration, finished_grace: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            idle_ttl,
            finished_grace,
        }
    }

    pub fn insert(&mut self, session: PlaybackSession) -> u64 {
        let sid = self.next_id;
        self.next_id += 1;
        self.sessions.insert(
            sid,
            Tracked {
                session,
                touched: Instant::now(),
            },
        );
        sid
    }

    /// Looks a session up and marks it as seen.
    pub fn get_mut(&mut self, sid: u64) -> Option<&mut PlaybackSession> {
        let tracked = self.sessions.get_mut(&sid)?;
        tracked.touched = Instant::now();
        Some(&mut tracked.session)
    }

    pub fn remove(&mut self, sid: u64) -> Option<PlaybackSession> {
        self.sessions.remove(&sid).map(|t| t.session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Releases stale sessions and returns how many went.
    pub fn sweep(&mut self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        let (idle_ttl, finished_grace) = (self.idle_ttl, self.finished_grace);
        self.sessions.retain(|sid, tracked| {
            let idle = now.saturating_duration_since(tracked.touched);
            let keep = idle < idle_ttl
                && !(tracked.session.snapshot().is_finished() && idle >= finished_grace);
            if !keep {
                debug!(session_id = *sid, idle_secs = idle.as_secs(), "Releasing playback session");
            }
            keep
        });
        before - self.sessions.len()
    }
}

fn spawn_ticker(updates: Arc<watch::Sender<PlaybackState>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let mut running = false;
            updates.send_modify(|s| running = s.tick());
            if !running {
                let state = updates.borrow();
                if state.phase == Phase::Ended {
                    info!(movie_id = state.movie_id, "Playback reached the end");
                }
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieSummary;

    fn detail(runtime: Option<u32>) -> MovieDetail {
        MovieDetail {
            summary: MovieSummary {
                id: 42,
                title: "Short Film".into(),
                poster_path: None,
                backdrop_path: Some("/b.jpg".into()),
                overview: String::new(),
                vote_average: 6.0,
                release_date: "2020-01-01".into(),
            },
            runtime,
            tagline: String::new(),
            genres: vec![],
            production_companies: vec![],
            cast: vec![],
            similar: vec![],
            videos: vec![],
        }
    }

    fn ready(runtime: Option<u32>) -> PlaybackState {
        let mut state = PlaybackState::loading(42);
        state.ready(&detail(runtime));
        state
    }

    #[test]
    fn ready_derives_duration_and_autoplays() {
        let state = ready(Some(95));
        assert_eq!(state.duration, 95 * 60);
        assert_eq!(state.current_time, 0);
        assert_eq!(state.progress, 0.0);
        assert!(state.playing);
        assert_eq!(state.phase, Phase::Playing);
        assert_eq!(
            state.backdrop_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/b.jpg")
        );
    }

    #[test]
    fn progress_tracks_clock_and_ends_exactly_at_duration() {
        let mut state = ready(Some(2));
        for expected in 1..120 {
            assert!(state.tick());
            assert_eq!(state.current_time, expected);
            assert!(state.playing, "stopped early at {expected}");
            let want = f64::from(expected) / 120.0 * 100.0;
            assert!((state.progress - want).abs() < 1e-9);
        }
        assert!(!state.tick());
        assert_eq!(state.current_time, 120);
        assert_eq!(state.progress, 100.0);
        assert!(!state.playing);
        assert_eq!(state.phase, Phase::Ended);

        assert!(!state.tick());
        assert_eq!(state.current_time, 120);
    }

    #[test]
    fn zero_runtime_ends_on_first_tick() {
        let mut state = ready(None);
        assert_eq!(state.duration, 0);
        assert!(!state.tick());
        assert_eq!(state.current_time, 0);
        assert_eq!(state.progress, 100.0);
        assert_eq!(state.phase, Phase::Ended);
    }

    #[test]
    fn paused_clock_does_not_move() {
        let mut state = ready(Some(1));
        state.tick();
        state.toggle_play();
        assert_eq!(state.phase, Phase::Paused);
        assert!(!state.tick());
        assert_eq!(state.current_time, 1);
        state.toggle_play();
        assert!(state.tick());
        assert_eq!(state.current_time, 2);
    }

    #[test]
    fn runtime_too_large_for_seconds_fails() {
        let state = ready(Some(80_000_000));
        assert_eq!(state.phase, Phase::Failed);
        assert_eq!(state.error.as_deref(), Some(BAD_RUNTIME_MESSAGE));
        assert_eq!(state.duration, 0);
        assert!(!state.playing);
    }

    #[test]
    fn failure_only_from_loading() {
        let mut state = PlaybackState::loading(1);
        state.fail(NOT_FOUND_MESSAGE);
        assert_eq!(state.phase, Phase::Failed);
        state.toggle_play();
        assert_eq!(state.phase, Phase::Failed);
        state.ready(&detail(Some(10)));
        assert_eq!(state.phase, Phase::Failed);

        let mut playing = ready(Some(1));
        playing.fail("nope");
        assert_eq!(playing.phase, Phase::Playing);
    }

    #[test]
    fn fullscreen_mirrors_platform() {
        let mut state = ready(Some(1));
        assert!(state.toggle_fullscreen());
        state.sync_fullscreen(false);
        assert!(!state.fullscreen);
        state.toggle_fullscreen();
        state.close();
        assert!(!state.fullscreen);
        assert_eq!(state.phase, Phase::Closed);
    }

    #[test]
    fn clock_formats_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(65), "01:05");
        assert_eq!(format_clock(125 * 60), "125:00");
        let mut state = ready(Some(3));
        state.tick();
        assert_eq!(state.clock_label(), "00:01 / 03:00");
    }

    #[tokio::test(start_paused = true)]
    async fn session_ticks_once_per_second() {
        let session = PlaybackSession::from_detail(&detail(Some(10)));
        assert!(session.has_running_timer());
        time::sleep(Duration::from_millis(3_500)).await;
        let snap = session.snapshot();
        assert_eq!(snap.current_time, 3);
        assert!(snap.playing);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_the_timer_and_resume_restarts_it() {
        let mut session = PlaybackSession::from_detail(&detail(Some(10)));
        time::sleep(Duration::from_millis(2_500)).await;
        let paused = session.toggle_play();
        assert_eq!(paused.phase, Phase::Paused);
        assert!(!session.has_running_timer());

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(session.snapshot().current_time, 2);

        session.toggle_play();
        assert!(session.has_running_timer());
        time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(session.snapshot().current_time, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_finishes_when_movie_ends() {
        let session = PlaybackSession::from_detail(&detail(Some(1)));
        time::sleep(Duration::from_secs(61)).await;
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Ended);
        assert_eq!(snap.current_time, 60);
        assert!(!snap.playing);
        assert!(!session.has_running_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn close_and_drop_release_the_timer() {
        let mut session = PlaybackSession::from_detail(&detail(Some(10)));
        time::sleep(Duration::from_millis(1_500)).await;
        let closed = session.close();
        assert_eq!(closed.phase, Phase::Closed);
        assert!(!session.has_running_timer());
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.snapshot().current_time, 1);

        let other = PlaybackSession::from_detail(&detail(Some(10)));
        let rx = other.subscribe();
        drop(other);
        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(rx.borrow().current_time, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_runtime_never_starts_a_timer() {
        let session = PlaybackSession::from_detail(&detail(Some(80_000_000)));
        assert_eq!(session.snapshot().phase, Phase::Failed);
        assert!(!session.has_running_timer());
    }

    #[tokio::test(start_paused = true)]
    async fn registry_releases_finished_sessions_after_grace() {
        let mut registry = SessionRegistry::default();
        let short = registry.insert(PlaybackSession::from_detail(&detail(Some(1))));
        let long = registry.insert(PlaybackSession::from_detail(&detail(Some(100))));

        time::sleep(Duration::from_secs(61)).await;
        assert_eq!(
            registry.get_mut(short).map(|s| s.snapshot().phase),
            Some(Phase::Ended)
        );
        assert_eq!(registry.sweep(), 0);

        time::sleep(FINISHED_SESSION_GRACE).await;
        assert_eq!(registry.sweep(), 1);
        assert!(registry.get_mut(short).is_none());
        assert!(registry.get_mut(long).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn registry_releases_abandoned_sessions_and_their_timers() {
        let mut registry = SessionRegistry::default();
        let sid = registry.insert(PlaybackSession::from_detail(&detail(Some(100))));
        let rx = registry
            .get_mut(sid)
            .map(|s| s.subscribe())
            .expect("session registered");

        time::sleep(SESSION_IDLE_TTL - Duration::from_secs(1)).await;
        assert_eq!(registry.sweep(), 0);
        let before = rx.borrow().current_time;

        time::sleep(SESSION_IDLE_TTL).await;
        // The clock advanced only until the sweep dropped the session.
        assert_eq!(registry.sweep(), 1);
        assert!(registry.is_empty());
        let at_release = rx.borrow().current_time;
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(rx.borrow().current_time, at_release);
        assert!(at_release > before);
    }
}
