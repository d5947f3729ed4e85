//! Gameplay tuning values

/// Every gameplay constant of the arena, in one place.
///
/// Distances are in arena pixels, speeds in px/s, times in milliseconds.
/// Friction factors are per 1/60 s and get rescaled by `dt * 60`.
#[derive(Debug, Clone)]
pub struct Tuning {
    pub arena_w: f32,
    pub arena_h: f32,

    pub player_radius: f32,
    pub ball_radius: f32,

    pub human_speed: f32,
    /// Fraction of velocity error left after one second (`1 - k^dt` response)
    pub human_response: f32,
    pub bot_speed: f32,
    pub bot_response: f32,
    pub friction: f32,
    /// Velocity kept after sliding along an obstacle
    pub obstacle_slide_damping: f32,

    pub min_throw_speed: f32,
    pub max_throw_speed: f32,
    pub charge_ms: f64,
    /// Exponent of the charge-to-speed ease; 1.0 is linear
    pub charge_curve: f32,
    pub throw_noise_base_deg: f32,
    pub throw_noise_extra_deg: f32,
    /// Thrower speed at which movement noise saturates
    pub throw_noise_speed_ref: f32,
    /// Multiplier on the Gaussian deviate; 0 disables angular noise
    pub throw_noise_scale: f32,

    pub ball_friction: f32,
    pub ball_wall_bounce: f32,
    pub ball_obstacle_restitution: f32,
    pub ball_obstacle_damping: f32,
    pub pickup_speed: f32,
    pub disarm_speed: f32,

    pub hit_cooldown_ms: f64,
    pub touch_tag_cooldown_ms: f64,

    pub separation_impulse: f32,
    pub separation_passes: usize,

    pub win_points: f32,
    pub prox_max_dist: f32,
    pub prox_points_per_sec: f32,
    pub prox_exponent: f32,
    pub it_bleed_points_per_sec: f32,

    pub bot_count: usize,
    /// Endless mode never ends the match on score
    pub endless: bool,
    pub spawn_padding: f32,
    pub max_name_len: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            arena_w: 1200.0,
            arena_h: 720.0,

            player_radius: 14.0,
            ball_radius: 9.0,

            human_speed: 1080.0,
            human_response: 0.001,
            bot_speed: 820.0,
            bot_response: 0.01,
            friction: 0.90,
            obstacle_slide_damping: 0.92,

            min_throw_speed: 220.0,
            max_throw_speed: 820.0,
            charge_ms: 900.0,
            charge_curve: 1.0,
            throw_noise_base_deg: 3.5,
            throw_noise_extra_deg: 10.0,
            throw_noise_speed_ref: 540.0,
            throw_noise_scale: 1.0,

            ball_friction: 0.992,
            ball_wall_bounce: 0.72,
            ball_obstacle_restitution: 1.65,
            ball_obstacle_damping: 0.88,
            pickup_speed: 220.0,
            disarm_speed: 55.0,

            hit_cooldown_ms: 450.0,
            touch_tag_cooldown_ms: 650.0,

            separation_impulse: 0.35,
            separation_passes: 2,

            win_points: 100.0,
            prox_max_dist: 260.0,
            prox_points_per_sec: 16.0,
            prox_exponent: 1.6,
            it_bleed_points_per_sec: 6.0,

            bot_count: 14,
            endless: true,
            spawn_padding: 60.0,
            max_name_len: 24,
        }
    }
}

impl Tuning {
    /// Contact distance between two players
    pub fn tag_range(&self) -> f32 {
        self.player_radius * 2.0
    }

    /// Contact distance between a player and the ball
    pub fn ball_contact_range(&self) -> f32 {
        self.player_radius + self.ball_radius
    }

    /// Launch speed for a charge fraction.
    ///
    /// Charge 0 maps exactly to `min_throw_speed` and 1 to `max_throw_speed`.
    pub fn throw_speed(&self, charge01: f32) -> f32 {
        let charge = if charge01.is_finite() {
            charge01.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let eased = charge.powf(self.charge_curve.max(0.01));
        self.min_throw_speed + (self.max_throw_speed - self.min_throw_speed) * eased
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throw_speed_endpoints() {
        let tuning = Tuning::default();
        assert_eq!(tuning.throw_speed(0.0), tuning.min_throw_speed);
        assert_eq!(tuning.throw_speed(1.0), tuning.max_throw_speed);
    }

    #[test]
    fn throw_speed_endpoints_hold_for_eased_curve() {
        let tuning = Tuning {
            charge_curve: 1.7,
            ..Tuning::default()
        };
        assert_eq!(tuning.throw_speed(0.0), tuning.min_throw_speed);
        assert_eq!(tuning.throw_speed(1.0), tuning.max_throw_speed);
        // power ease lags the linear curve mid-charge
        assert!(tuning.throw_speed(0.5) < 520.0);
    }

    #[test]
    fn throw_speed_clamps_bad_charge() {
        let tuning = Tuning::default();
        assert_eq!(tuning.throw_speed(-3.0), tuning.min_throw_speed);
        assert_eq!(tuning.throw_speed(7.0), tuning.max_throw_speed);
        assert_eq!(tuning.throw_speed(f32::NAN), tuning.min_throw_speed);
    }
}
