//! # Velocity モジュール
//!
//! 正規化速度（0〜1）の加減速カーブを提供します。
//!
//! 船の移動・回転、カメラのパン・回転・ズームはすべてこのランプを共有し、
//! 「加速すべきか」の判定だけを呼び出し側が決めます。

/// 速度変化量を計算
///
/// 加速中は `accel_rate * dt`、それ以外は `-decel_rate * dt` を返します。
/// 0〜1への制限は行わないため、適用は [`apply_velocity_change`] で行います。
///
/// # 引数
///
/// * `_current` - 現在の正規化速度（変化量には影響しない）
/// * `decel_rate` - 減速レート（1秒あたり）
/// * `accel_rate` - 加速レート（1秒あたり）
/// * `should_accelerate` - 加速条件
/// * `dt` - 時間刻み（秒）
pub fn velocity_change(
    _current: f64,
    decel_rate: f64,
    accel_rate: f64,
    should_accelerate: bool,
    dt: f64,
) -> f64 {
    if should_accelerate {
        accel_rate * dt
    } else {
        -decel_rate * dt
    }
}

/// 距離しきい値による速度変化量を計算
///
/// 残り距離が減速開始距離より大きい間は加速し、減速帯に入ると減速します。
pub fn velocity_change_by_distance(
    current: f64,
    decel_rate: f64,
    accel_rate: f64,
    remaining_distance: f64,
    decel_distance: f64,
    dt: f64,
) -> f64 {
    velocity_change(
        current,
        decel_rate,
        accel_rate,
        remaining_distance > decel_distance,
        dt,
    )
}

/// 速度変化量を適用して0〜1に制限
pub fn apply_velocity_change(current: f64, delta: f64) -> f64 {
    let next = current + delta;
    if next.is_nan() {
        return 0.0;
    }
    next.clamp(0.0, 1.0)
}

/// 1軸分の加減速状態
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityRamp {
    velocity: f64,
    accelerating: bool,
    /// 加速レート（1秒あたり）
    pub accel_rate: f64,
    /// 減速レート（1秒あたり）
    pub decel_rate: f64,
}

impl VelocityRamp {
    pub fn new(accel_rate: f64, decel_rate: f64) -> Self {
        Self {
            velocity: 0.0,
            accelerating: false,
            accel_rate,
            decel_rate,
        }
    }

    /// 加速条件を与えて1ティック更新し、新しい速度を返す
    pub fn update(&mut self, should_accelerate: bool, dt: f64) -> f64 {
        self.accelerating = should_accelerate;
        let delta = velocity_change(
            self.velocity,
            self.decel_rate,
            self.accel_rate,
            should_accelerate,
            dt,
        );
        self.velocity = apply_velocity_change(self.velocity, delta);
        self.velocity
    }

    /// 距離しきい値で1ティック更新
    pub fn update_by_distance(&mut self, remaining_distance: f64, decel_distance: f64, dt: f64) -> f64 {
        self.update(remaining_distance > decel_distance, dt)
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: f64) {
        self.velocity = apply_velocity_change(velocity, 0.0);
    }

    pub fn is_accelerating(&self) -> bool {
        self.accelerating
    }

    /// 加速フラグのみ初期状態に戻す（速度は維持）
    pub fn reset_accelerating(&mut self) {
        self.accelerating = false;
    }

    /// 速度を0にして停止
    pub fn stop(&mut self) {
        self.velocity = 0.0;
        self.accelerating = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DT: f64 = 0.02;

    #[test]
    fn test_accelerate_from_rest() {
        let mut ramp = VelocityRamp::new(1.0, 0.99);
        for _ in 0..10 {
            ramp.update(true, DT);
        }
        assert!((ramp.velocity() - 0.2).abs() < 1e-9);
        assert!(ramp.is_accelerating());

        for _ in 0..100 {
            ramp.update(true, DT);
        }
        assert_eq!(ramp.velocity(), 1.0);
    }

    #[test]
    fn test_decelerate_from_full() {
        let mut ramp = VelocityRamp::new(1.0, 2.0);
        ramp.set_velocity(1.0);
        for _ in 0..5 {
            ramp.update(false, DT);
        }
        assert!((ramp.velocity() - 0.8).abs() < 1e-9);

        for _ in 0..100 {
            ramp.update(false, DT);
        }
        assert_eq!(ramp.velocity(), 0.0);
    }

    #[test]
    fn test_delta_is_raw_and_clamped_on_apply() {
        let up = velocity_change(0.95, 1.0, 5.0, true, DT);
        assert!((up - 0.1).abs() < 1e-12);
        assert_eq!(apply_velocity_change(0.95, up), 1.0);

        let down = velocity_change(0.01, 3.0, 1.0, false, DT);
        assert!((down + 0.06).abs() < 1e-12);
        assert_eq!(apply_velocity_change(0.01, down), 0.0);

        assert_eq!(apply_velocity_change(0.5, f64::NAN), 0.0);
    }

    #[test]
    fn test_distance_gate() {
        assert!(velocity_change_by_distance(0.0, 1.0, 1.0, 10.0, 2.0, DT) > 0.0);
        assert!(velocity_change_by_distance(0.5, 1.0, 1.0, 1.0, 2.0, DT) < 0.0);
        // 減速開始距離ちょうどでは減速
        assert!(velocity_change_by_distance(0.5, 1.0, 1.0, 2.0, 2.0, DT) < 0.0);
    }

    proptest! {
        #[test]
        fn velocity_stays_normalized(
            accel in 0.01f64..20.0,
            decel in 0.01f64..20.0,
            dt in 0.001f64..0.5,
            inputs in proptest::collection::vec(any::<bool>(), 0..300),
        ) {
            let mut ramp = VelocityRamp::new(accel, decel);
            for should_accelerate in inputs {
                let v = ramp.update(should_accelerate, dt);
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }

        #[test]
        fn accelerating_ticks_follow_ramp(n in 0usize..200, accel in 0.1f64..5.0) {
            let mut ramp = VelocityRamp::new(accel, 1.0);
            for _ in 0..n {
                ramp.update(true, DT);
            }
            let expected = (n as f64 * accel * DT).min(1.0);
            prop_assert!((ramp.velocity() - expected).abs() < 1e-9);
        }

        #[test]
        fn decelerating_ticks_follow_ramp(n in 0usize..200, decel in 0.1f64..5.0) {
            let mut ramp = VelocityRamp::new(1.0, decel);
            ramp.set_velocity(1.0);
            for _ in 0..n {
                ramp.update(false, DT);
            }
            let expected = (1.0 - n as f64 * decel * DT).max(0.0);
            prop_assert!((ramp.velocity() - expected).abs() < 1e-9);
        }
    }
}
