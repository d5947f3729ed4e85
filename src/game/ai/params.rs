//! Decision engine constants

/// Time as IT over which shed urgency ramps from 0 to 1
pub const SHED_RAMP_MS: f64 = 3200.0;

/// Perceived-target refresh interval: base plus a part that shrinks with urgency
pub const PERCEPTION_BASE_MS: f64 = 60.0;
pub const PERCEPTION_EXTRA_MS: f64 = 90.0;
/// Positional noise per px/s of target speed
pub const PERCEPTION_NOISE: f32 = 0.035;

/// Candidate target scoring weights, early (leader-hunting) and late (shedding)
pub const LEAD_WEIGHT_EARLY: f32 = 2.2;
pub const LEAD_WEIGHT_LATE: f32 = 0.4;
pub const NEAR_WEIGHT_EARLY: f32 = 0.9;
pub const NEAR_WEIGHT_LATE: f32 = 3.0;
pub const JITTER_WEIGHT: f32 = 0.4;
pub const NEAR_RANGE: f32 = 900.0;
/// A new target must beat the current one by this factor
pub const TARGET_SWITCH_MARGIN: f32 = 1.15;

pub const THROW_RANGE: f32 = 900.0;
pub const THROW_COOLDOWN_MS: f64 = 950.0;
pub const WINDUP_MIN_MS: f64 = 420.0;
pub const WINDUP_MAX_MS: f64 = 640.0;
/// Pause after an aborted wind-up
pub const ABORT_BACKOFF_MS: f64 = 350.0;
/// Release needs this share of the start threshold
pub const RELEASE_THRESHOLD_SHARE: f32 = 0.75;
/// Extra distance past tag range inside which IT rushes instead of throwing
pub const RUSH_MARGIN: f32 = 70.0;
pub const RUSH_MARGIN_URGENT: f32 = 90.0;

/// Confidence cluster radius around the projected impact point
pub const CLUSTER_RADIUS: f32 = 70.0;
pub const ISOLATION_RADIUS: f32 = 140.0;
pub const CLUSTER_BONUS: f32 = 0.06;
pub const ISOLATION_PENALTY: f32 = 0.05;
/// Lateral target speed at which crossing halves confidence
pub const CROSSING_SPEED_REF: f32 = 260.0;

/// Stuck detection
pub const STUCK_PLAN_EPS: f32 = 1.5;
pub const STUCK_MOVE_RATIO: f32 = 0.3;
pub const STUCK_PANIC_MS: f64 = 340.0;
pub const PANIC_MIN_MS: f64 = 1800.0;
pub const PANIC_MAX_MS: f64 = 3200.0;
pub const PANIC_REROLL_MIN_MS: f64 = 120.0;
pub const PANIC_REROLL_MAX_MS: f64 = 340.0;
pub const PANIC_SPEED: f32 = 1.1;
pub const EDGE_AVOID_DIST: f32 = 120.0;
pub const OBSTACLE_AVOID_DIST: f32 = 110.0;
pub const PANIC_IT_PUSH_DIST: f32 = 400.0;

/// Incoming-throw dodge
pub const DODGE_MIN_SPEED: f32 = 260.0;
pub const DODGE_LEAD_SECS: f32 = 0.45;
pub const DODGE_MAX_LEAD: f32 = 420.0;
pub const DODGE_MARGIN: f32 = 26.0;

/// Loose-ball avoidance and contest
pub const AVOID_BALL_RADIUS: f32 = 460.0;
pub const AVOID_BALL_WEIGHT: f32 = 1.8;
pub const CONTEST_BASE_RANGE: f32 = 260.0;
pub const CONTEST_BOLD_RANGE: f32 = 200.0;
pub const CONTEST_MIN_BOLDNESS: f32 = 0.45;

/// Farming standoff distances (safe window, normal)
pub const FARM_SWEET_SAFE: f32 = 80.0;
pub const FARM_SWEET: f32 = 140.0;
pub const FARM_FAR_SAFE: f32 = 170.0;
pub const FARM_FAR: f32 = 280.0;
pub const WOBBLE_PERIOD_MS: f64 = 520.0;
pub const WOBBLE_AMPLITUDE: f32 = 0.9;
/// Distance at which an aimed telegraph counts as aimed at us
pub const AIMED_AT_RADIUS: f32 = 90.0;

/// Steering look-ahead for open-ended goals
pub const GOAL_REACH: f32 = 160.0;

/// Boldness trait shape
pub const BOLD_AMP_SLOW: f32 = 0.22;
pub const BOLD_AMP_FAST: f32 = 0.12;
pub const BOLD_PERIOD_SLOW_MS: (f64, f64) = (7000.0, 13000.0);
pub const BOLD_PERIOD_FAST_MS: (f64, f64) = (2500.0, 5000.0);
/// Leader score share at which the endgame boost starts
pub const ENDGAME_START: f32 = 0.55;
pub const ENDGAME_BOOST: f32 = 0.3;
pub const CHASER_BOOST: f32 = 0.15;
