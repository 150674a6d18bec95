//! Video player grading: credit for watching a video to the end or for
//! viewing a share of it.
//!
//! Player events are fed in by the embedding player; any throttling of
//! progress events happens there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Status message shown once every grader has completed.
pub const CREDIT_MESSAGE: &str = "You've received credit for viewing this video.";

/// Timeline resolution for percent-viewed grading.
const TIMELINE_SIZE: usize = 100;
/// Minimum spacing between recorded progress events, in milliseconds.
const MIN_WAIT_MS: f64 = 200.0;

/// An event emitted by the video player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PlayerEvent {
    /// Playback started; `duration` is the video length in seconds.
    Play { duration: f64 },
    /// Playback reached `current_time` seconds.
    Progress { current_time: f64 },
    /// Playback reached the end.
    Ended,
}

/// A single grading rule attached to a video.
pub trait VideoGrader: Send + Sync {
    /// Name the backend knows this grader by.
    fn name(&self) -> &'static str;

    /// Feed one event; returns `true` once the grader is satisfied.
    fn handle(&mut self, event: PlayerEvent) -> bool;

    fn is_complete(&self) -> bool;
}

/// Satisfied when the video plays to the end.
#[derive(Debug, Default)]
pub struct GradeOnEnd {
    complete: bool,
}

impl VideoGrader for GradeOnEnd {
    fn name(&self) -> &'static str {
        "scored_on_end"
    }

    fn handle(&mut self, event: PlayerEvent) -> bool {
        if event == PlayerEvent::Ended {
            self.complete = true;
        }
        self.complete
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Satisfied once more than `percent` of the video has been viewed.
///
/// The video is split into `size + 1` slots; a progress event marks the slot
/// its timestamp falls in. Short videos produce fewer progress events, so
/// the timeline shrinks to the number of events expected and each slot
/// counts for proportionally more.
#[derive(Debug)]
pub struct GradeOnPercent {
    threshold: f64,
    size: usize,
    coef: f64,
    duration: Option<f64>,
    timeline: Vec<bool>,
    complete: bool,
}

impl GradeOnPercent {
    pub fn new(percent: f64) -> Self {
        Self {
            threshold: percent + 1.0,
            size: TIMELINE_SIZE,
            coef: 1.0,
            duration: None,
            timeline: Vec::new(),
            complete: percent <= 0.0,
        }
    }

    /// Viewed share so far, on a 0..=101 scale.
    pub fn progress(&self) -> f64 {
        self.timeline.iter().filter(|&&seen| seen).count() as f64 * self.coef
    }

    fn on_play(&mut self, duration: f64) {
        if self.duration.is_some() || !duration.is_finite() || duration <= 0.0 {
            return;
        }

        let millis = duration * 1000.0;
        let wait = (millis / TIMELINE_SIZE as f64).max(MIN_WAIT_MS);
        let expected_events = millis / wait;
        if expected_events < TIMELINE_SIZE as f64 {
            self.size = (expected_events.floor() as usize).max(1);
            self.coef = TIMELINE_SIZE as f64 / self.size as f64;
        }

        self.duration = Some(duration);
        self.timeline = vec![false; self.size + 1];
        debug!(duration, size = self.size, coef = self.coef, "percent grader armed");
    }

    fn on_progress(&mut self, current_time: f64) {
        let Some(duration) = self.duration else {
            return;
        };
        if !current_time.is_finite() || current_time < 0.0 {
            return;
        }

        let position = ((self.size as f64 * current_time / duration).floor() as usize).min(self.size);
        self.timeline[position] = true;
        if self.progress() >= self.threshold {
            self.complete = true;
        }
    }
}

impl VideoGrader for GradeOnPercent {
    fn name(&self) -> &'static str {
        "scored_on_percent"
    }

    fn handle(&mut self, event: PlayerEvent) -> bool {
        if !self.complete {
            match event {
                PlayerEvent::Play { duration } => self.on_play(duration),
                PlayerEvent::Progress { current_time } => self.on_progress(current_time),
                PlayerEvent::Ended => {}
            }
        }
        self.complete
    }

    fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Per-grader settings sent by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraderSettings {
    /// Percentage for `scored_on_percent`; unused by `scored_on_end`.
    #[serde(default)]
    pub grader_value: f64,
    /// Already satisfied in an earlier session.
    #[serde(default)]
    pub grader_status: bool,
}

/// Grading configuration of one video.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoGradingConfig {
    #[serde(default)]
    pub has_score: bool,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
    /// Score already stored for the learner, if any.
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub graders: BTreeMap<String, GraderSettings>,
}

fn default_max_score() -> f64 {
    1.0
}

/// Build the grader registered under `name`, if there is one.
pub fn grader_for(name: &str, settings: &GraderSettings) -> Option<Box<dyn VideoGrader>> {
    match name {
        "scored_on_end" => Some(Box::new(GradeOnEnd::default())),
        "scored_on_percent" => Some(Box::new(GradeOnPercent::new(settings.grader_value))),
        _ => None,
    }
}

/// Tracks every grader of a video and the learner's resulting score.
pub struct VideoGrading {
    max_score: f64,
    score: Option<f64>,
    graders: Vec<Box<dyn VideoGrader>>,
}

impl VideoGrading {
    pub fn new(config: &VideoGradingConfig) -> Self {
        let score = config.score.filter(|s| s.is_finite());
        let graders = if !config.has_score || score.is_some() {
            Vec::new()
        } else {
            config
                .graders
                .iter()
                .filter(|(_, settings)| !settings.grader_status)
                .filter_map(|(name, settings)| {
                    let grader = grader_for(name, settings);
                    if grader.is_none() {
                        debug!(name = %name, "ignoring unknown video grader");
                    }
                    grader
                })
                .collect()
        };

        let mut grading = Self {
            max_score: config.max_score,
            score,
            graders,
        };
        if config.has_score && grading.score.is_none() && grading.all_complete() {
            grading.score = Some(grading.max_score);
        }
        grading
    }

    pub fn graders(&self) -> impl Iterator<Item = &dyn VideoGrader> {
        self.graders.iter().map(|g| g.as_ref())
    }

    fn all_complete(&self) -> bool {
        self.graders.iter().all(|g| g.is_complete())
    }

    /// Feed a player event. Returns the names of graders completed by it.
    pub fn handle(&mut self, event: PlayerEvent) -> Vec<&'static str> {
        if self.score.is_some() {
            return Vec::new();
        }

        let mut completed = Vec::new();
        for grader in &mut self.graders {
            if !grader.is_complete() && grader.handle(event) {
                completed.push(grader.name());
            }
        }

        if !completed.is_empty() && self.all_complete() {
            self.score = Some(self.max_score);
            debug!(score = self.max_score, "video fully graded");
        }
        completed
    }

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn is_graded(&self) -> bool {
        self.score.is_some()
    }

    pub fn progress_message(&self) -> String {
        progress_message(self.score, self.max_score)
    }

    pub fn status_message(&self) -> Option<&'static str> {
        self.is_graded().then_some(CREDIT_MESSAGE)
    }
}

/// Format points the way the player shows them (`1.0`, `0.5`, `2.25`).
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{points:.1}")
    } else {
        format!("{points}")
    }
}

/// `"(1.0 / 1.0 points)"` once scored, `"(1.0 points possible)"` before.
pub fn progress_message(score: Option<f64>, max_score: f64) -> String {
    match score.filter(|s| s.is_finite()) {
        Some(points) => format!(
            "({} / {} points)",
            format_points(points),
            format_points(max_score)
        ),
        None => format!("({} points possible)", format_points(max_score)),
    }
}

/// YouTube ids of a video, one per playback speed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YoutubeIds {
    #[serde(default)]
    pub speed_0_75: Option<String>,
    #[serde(default)]
    pub speed_1_0: Option<String>,
    #[serde(default)]
    pub speed_1_25: Option<String>,
    #[serde(default)]
    pub speed_1_5: Option<String>,
}

/// `speed:id` pairs joined by commas, skipping speeds without an id.
pub fn youtube_speed_string(ids: &YoutubeIds) -> String {
    [
        ("0.75", &ids.speed_0_75),
        ("1.00", &ids.speed_1_0),
        ("1.25", &ids.speed_1_25),
        ("1.50", &ids.speed_1_5),
    ]
    .iter()
    .filter_map(|(speed, id)| {
        id.as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{speed}:{id}"))
    })
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Play, then report progress at the middle of each of the first `slots` steps.
    fn play_through(grader: &mut GradeOnPercent, duration: f64, step: f64, slots: usize) -> bool {
        grader.handle(PlayerEvent::Play { duration });
        let mut done = false;
        for i in 0..slots {
            let current_time = (i as f64 + 0.5) * step;
            done = grader.handle(PlayerEvent::Progress { current_time });
        }
        done
    }

    fn config(graders: &[(&str, f64)]) -> VideoGradingConfig {
        VideoGradingConfig {
            has_score: true,
            max_score: 1.0,
            score: None,
            graders: graders
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        GraderSettings {
                            grader_value: *value,
                            grader_status: false,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn end_grader_completes_on_end_only() {
        let mut grader = GradeOnEnd::default();
        assert!(!grader.handle(PlayerEvent::Play { duration: 10.0 }));
        assert!(!grader.handle(PlayerEvent::Progress { current_time: 9.9 }));
        assert!(grader.handle(PlayerEvent::Ended));
        assert!(grader.is_complete());
    }

    #[test]
    fn zero_percent_completes_immediately() {
        assert!(GradeOnPercent::new(0.0).is_complete());
    }

    #[test]
    fn percent_grader_needs_more_than_threshold() {
        // 100s video: one slot per second.
        let mut grader = GradeOnPercent::new(50.0);
        assert!(!play_through(&mut grader, 100.0, 1.0, 50));
        assert!((grader.progress() - 50.0).abs() < 1e-9);
        assert!(grader.handle(PlayerEvent::Progress { current_time: 50.0 }));
    }

    #[test]
    fn full_percent_needs_the_end_slot() {
        let mut grader = GradeOnPercent::new(100.0);
        assert!(!play_through(&mut grader, 100.0, 1.0, 100));
        assert!(grader.handle(PlayerEvent::Progress { current_time: 100.0 }));
    }

    #[test]
    fn short_video_shrinks_timeline() {
        // 15s video: progress every 200ms gives 75 slots.
        let mut grader = GradeOnPercent::new(100.0);
        grader.handle(PlayerEvent::Play { duration: 15.0 });
        assert_eq!(grader.size, 75);
        assert!(!play_through(&mut grader, 15.0, 0.2, 75));
        assert!(grader.handle(PlayerEvent::Progress { current_time: 15.0 }));
    }

    #[test]
    fn progress_before_play_is_ignored() {
        let mut grader = GradeOnPercent::new(10.0);
        assert!(!grader.handle(PlayerEvent::Progress { current_time: 5.0 }));
        assert_eq!(grader.progress(), 0.0);
    }

    #[test]
    fn grading_scores_when_all_graders_done() {
        let mut grading = VideoGrading::new(&config(&[("scored_on_end", 0.0), ("scored_on_percent", 0.0)]));
        assert!(!grading.is_graded());
        assert_eq!(grading.progress_message(), "(1.0 points possible)");

        assert_eq!(grading.handle(PlayerEvent::Ended), vec!["scored_on_end"]);
        assert_eq!(grading.score(), Some(1.0));
        assert_eq!(grading.progress_message(), "(1.0 / 1.0 points)");
        assert_eq!(grading.status_message(), Some(CREDIT_MESSAGE));
    }

    #[test]
    fn zero_percent_grading_scores_immediately() {
        let grading = VideoGrading::new(&config(&[("scored_on_percent", 0.0)]));
        assert!(grading.is_graded());
    }

    #[test]
    fn stored_score_skips_graders() {
        let mut cfg = config(&[("scored_on_end", 0.0)]);
        cfg.score = Some(0.5);
        let mut grading = VideoGrading::new(&cfg);
        assert_eq!(grading.graders().count(), 0);
        assert!(grading.handle(PlayerEvent::Ended).is_empty());
        assert_eq!(grading.progress_message(), "(0.5 / 1.0 points)");
    }

    #[test]
    fn non_finite_score_is_treated_as_missing() {
        let mut cfg = config(&[("scored_on_end", 0.0)]);
        cfg.score = Some(f64::NAN);
        let grading = VideoGrading::new(&cfg);
        assert!(!grading.is_graded());
        assert_eq!(grading.graders().count(), 1);
    }

    #[test]
    fn completed_and_unknown_graders_are_skipped() {
        let mut cfg = config(&[("scored_on_end", 0.0), ("scored_on_magic", 0.0)]);
        cfg.graders.insert(
            "scored_on_percent".into(),
            GraderSettings {
                grader_value: 90.0,
                grader_status: true,
            },
        );
        let grading = VideoGrading::new(&cfg);
        let names: Vec<_> = grading.graders().map(|g| g.name()).collect();
        assert_eq!(names, ["scored_on_end"]);
    }

    #[test]
    fn ungraded_video_has_no_graders() {
        let mut cfg = config(&[("scored_on_end", 0.0)]);
        cfg.has_score = false;
        let grading = VideoGrading::new(&cfg);
        assert_eq!(grading.graders().count(), 0);
        assert!(!grading.is_graded());
    }

    #[test]
    fn events_deserialize_from_toml() {
        #[derive(Deserialize)]
        struct Events {
            events: Vec<PlayerEvent>,
        }

        let parsed: Events = toml::from_str(
            r#"events = [
                { event = "play", duration = 10.0 },
                { event = "progress", current_time = 2.5 },
                { event = "ended" },
            ]"#,
        )
        .unwrap();
        assert_eq!(
            parsed.events,
            vec![
                PlayerEvent::Play { duration: 10.0 },
                PlayerEvent::Progress { current_time: 2.5 },
                PlayerEvent::Ended,
            ]
        );
    }

    #[test]
    fn points_formatting() {
        assert_eq!(format_points(1.0), "1.0");
        assert_eq!(format_points(0.5), "0.5");
        assert_eq!(format_points(2.25), "2.25");
        assert_eq!(progress_message(None, 3.0), "(3.0 points possible)");
    }

    #[test]
    fn speed_string_skips_missing_ids() {
        let ids = YoutubeIds {
            speed_0_75: Some("slow".into()),
            speed_1_0: Some("normal".into()),
            speed_1_25: Some(String::new()),
            speed_1_5: None,
        };
        assert_eq!(youtube_speed_string(&ids), "0.75:slow,1.00:normal");
        assert_eq!(youtube_speed_string(&YoutubeIds::default()), "");
    }
}
