use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::models::{
    common::{math_utils, AgentStatus, Beacon, Transform},
    events::{ArrivalEvent, ArrivalNotifier},
    traits::{IAgent, IMovable},
    velocity::VelocityRamp,
};

/// 軽量艦の移動パラメータ
///
/// 距離は空間単位、角度は度、レートは1秒あたりの正規化速度変化量です。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipTuning {
    /// 基本移動速度（単位/秒）
    pub travel_speed: f64,
    /// 回転レート係数
    pub rotation_rate: f64,
    /// 近接時に回転を優先する角度しきい値（度）
    pub travel_angle_deg: f64,
    /// 移動・回転速度の加速レート
    pub travel_accel: f64,
    /// 移動・回転速度の減速レート
    pub travel_decel: f64,
    /// 修正係数を選択する近接距離
    pub near_target_distance: f64,
    /// 到着判定の追加マージン
    pub arrival_epsilon: f64,
    /// 減速開始距離（割り当て時距離に対する割合）
    pub decel_onset_fraction: f64,
    /// この距離未満で最終的な向きに切り替える
    pub final_facing_distance: f64,
    /// 回転を加速する最小角度（度）
    pub rotation_gate_angle_deg: f64,
    /// 回転を加速する最小距離
    pub rotation_gate_distance: f64,
    /// 向き目標を算出する際の1ティックあたり最大旋回量（ラジアン）
    pub max_turn_radians: f64,
    /// 近接時に角度が大きい場合の回転係数
    pub close_rotation_modifier: f64,
    /// 近接時に角度が大きい場合の移動係数
    pub close_travel_modifier: f64,
}

impl Default for ShipTuning {
    fn default() -> Self {
        Self {
            travel_speed: 50.0,
            rotation_rate: 0.1,
            travel_angle_deg: 15.0,
            travel_accel: 1.0,
            travel_decel: 0.99,
            near_target_distance: 15.0,
            arrival_epsilon: 0.3,
            decel_onset_fraction: 0.2,
            final_facing_distance: 1.0,
            rotation_gate_angle_deg: 1.0,
            rotation_gate_distance: 1.0,
            max_turn_radians: 360.0,
            close_rotation_modifier: 1.5,
            close_travel_modifier: 0.5,
        }
    }
}

/// 速度修正係数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedModifiers {
    pub travel: f64,
    pub rotation: f64,
    pub vertical: f64,
    pub horizontal: f64,
}

impl Default for SpeedModifiers {
    fn default() -> Self {
        Self {
            travel: 1.0,
            rotation: 1.0,
            vertical: 1.0,
            horizontal: 1.0,
        }
    }
}

impl SpeedModifiers {
    /// 目標方向との角度で移動と回転の配分を選ぶ
    ///
    /// 角度が大きいまま目標へ直進しないよう、回転を優先します。
    pub fn select_by_angle(&mut self, angle_deg: f64, tuning: &ShipTuning) {
        if angle_deg > tuning.travel_angle_deg {
            self.rotation = tuning.close_rotation_modifier;
            self.travel = tuning.close_travel_modifier;
        } else {
            self.rotation = 1.0;
            self.travel = 1.0;
        }
    }

    /// 水平・垂直の到着が同時になるよう軸ごとの係数を設定
    pub fn balance_axes(&mut self, horizontal_distance: f64, vertical_distance: f64) {
        let (horizontal, vertical) = axis_balance(horizontal_distance, vertical_distance);
        self.horizontal = horizontal;
        self.vertical = vertical;
    }
}

/// 軸バランス係数 `(水平, 垂直)` を計算
///
/// 残り距離の長い軸は1のまま、短い軸は `短い/長い` に抑えます。
/// 両方0の場合は水平係数がNaNになり、呼び出し側で到着扱いにします。
pub fn axis_balance(horizontal_distance: f64, vertical_distance: f64) -> (f64, f64) {
    if horizontal_distance > vertical_distance {
        (1.0, vertical_distance / horizontal_distance)
    } else {
        (horizontal_distance / vertical_distance, 1.0)
    }
}

/// 軸ごとの到着フラグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArrivalFlags {
    pub horizontal: bool,
    pub vertical: bool,
}

impl ArrivalFlags {
    pub fn both(&self) -> bool {
        self.horizontal && self.vertical
    }

    pub fn clear(&mut self) {
        self.horizontal = false;
        self.vertical = false;
    }
}

/// 艦の移動フェーズ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipPhase {
    /// 目標なし
    Idle,
    Approaching,
    HorizontallyArrived,
    VerticallyArrived,
    FullyArrived,
}

/// 割り当て中の目標
#[derive(Debug, Clone, Copy, PartialEq)]
struct AssignedTarget {
    beacon: Beacon,
    direction: DVec3,
    /// 割り当て時の距離
    initial_distance: f64,
    rotation_target: DQuat,
    final_rotation: DQuat,
}

/// 軽量艦エージェント
///
/// 目標ビーコンへ向けて回転しながら、水平・垂直を別々の速度で移動します。
/// 移動速度と回転速度はそれぞれ加減速ランプで制御され、両軸が到着すると
/// ビーコン位置にスナップして到着を一度だけ通知します。
#[derive(Debug, Clone)]
pub struct LightShip {
    pub id: String,
    pub transform: Transform,
    pub tuning: ShipTuning,
    pub status: AgentStatus,
    target: Option<AssignedTarget>,
    travel: VelocityRamp,
    rotation: VelocityRamp,
    modifiers: SpeedModifiers,
    arrival: ArrivalFlags,
    allowed_to_arrive: bool,
    distance_to_target: f64,
    angle_to_target: f64,
    notifier: ArrivalNotifier,
}

impl LightShip {
    pub fn new(id: String, transform: Transform) -> Self {
        Self::with_tuning(id, transform, ShipTuning::default())
    }

    pub fn with_tuning(id: String, transform: Transform, tuning: ShipTuning) -> Self {
        let notifier = ArrivalNotifier::new(id.clone());
        Self {
            id,
            transform,
            tuning,
            status: AgentStatus::Active,
            target: None,
            travel: VelocityRamp::new(tuning.travel_accel, tuning.travel_decel),
            rotation: VelocityRamp::new(tuning.travel_accel, tuning.travel_decel),
            modifiers: SpeedModifiers::default(),
            arrival: ArrivalFlags::default(),
            allowed_to_arrive: true,
            distance_to_target: 0.0,
            angle_to_target: 0.0,
            notifier,
        }
    }

    /// 新しい目標ビーコンを割り当て
    ///
    /// 前の目標に水平到着済みだった場合は移動速度を0から再開します。
    /// 移動中（到着不許可で到着フラグがfalseの間を含む）の再割り当てでは現在の速度を維持します。
    pub fn set_target(&mut self, beacon: Beacon) {
        if self.is_horizontally_arrived() {
            self.travel.stop();
        }
        self.travel.reset_accelerating();
        self.rotation.reset_accelerating();
        self.arrival.clear();
        self.modifiers = SpeedModifiers::default();

        let forward = self.transform.forward();
        let direction = beacon.position - self.transform.position;
        let look = math_utils::rotate_direction_towards(forward, direction, self.tuning.max_turn_radians);
        let rotation_target = math_utils::look_rotation(look).unwrap_or(self.transform.rotation);
        let final_rotation = math_utils::look_rotation(beacon.forward()).unwrap_or(beacon.rotation);

        self.distance_to_target = direction.length();
        self.angle_to_target = math_utils::angle_between_deg(forward, direction);
        self.target = Some(AssignedTarget {
            beacon,
            direction,
            initial_distance: self.distance_to_target,
            rotation_target,
            final_rotation,
        });

        let event = self.notifier.assign();
        debug!(
            "艦 {} に目標を割り当て (指示 #{}, 距離: {:.2})",
            self.id, event.order, self.distance_to_target
        );
    }

    /// 目標ビーコンを取り除く（以降のティックは何もしない）
    pub fn remove_target(&mut self) {
        if self.target.take().is_some() {
            debug!("艦 {} の目標が解除されました", self.id);
        }
    }

    /// 到着許可を設定
    ///
    /// 不許可の間は到着フラグが常にfalseとなり、完了（スナップと通知）を保留します。
    /// 速度はリセットしません。許可に戻した時点で両軸が到着済みなら
    /// 即座に目標位置へスナップします。
    pub fn set_allowed_to_arrive(&mut self, allowed: bool) {
        self.allowed_to_arrive = allowed;
        debug!("艦 {} の到着許可: {}", self.id, allowed);
        if allowed && self.arrival.both() {
            self.complete_arrival();
        }
    }

    pub fn is_allowed_to_arrive(&self) -> bool {
        self.allowed_to_arrive
    }

    pub fn target_position(&self) -> Option<DVec3> {
        self.target.map(|t| t.beacon.position)
    }

    pub fn travel_velocity(&self) -> f64 {
        self.travel.velocity()
    }

    pub fn rotation_velocity(&self) -> f64 {
        self.rotation.velocity()
    }

    pub fn modifiers(&self) -> SpeedModifiers {
        self.modifiers
    }

    pub fn distance_to_target(&self) -> f64 {
        self.distance_to_target
    }

    pub fn angle_to_target(&self) -> f64 {
        self.angle_to_target
    }

    /// 減速開始距離（割り当て時距離の一定割合）
    pub fn decel_onset_distance(&self) -> Option<f64> {
        self.target
            .map(|t| t.initial_distance * self.tuning.decel_onset_fraction)
    }

    /// 水平到着フラグ（到着不許可中は常にfalse）
    pub fn is_horizontally_arrived(&self) -> bool {
        self.allowed_to_arrive && self.arrival.horizontal
    }

    /// 垂直到着フラグ（到着不許可中は常にfalse）
    pub fn is_vertically_arrived(&self) -> bool {
        self.allowed_to_arrive && self.arrival.vertical
    }

    pub fn has_arrived(&self) -> bool {
        self.target.is_some() && self.is_horizontally_arrived() && self.is_vertically_arrived()
    }

    pub fn phase(&self) -> ShipPhase {
        if self.target.is_none() {
            return ShipPhase::Idle;
        }
        match (self.is_horizontally_arrived(), self.is_vertically_arrived()) {
            (true, true) => ShipPhase::FullyArrived,
            (true, false) => ShipPhase::HorizontallyArrived,
            (false, true) => ShipPhase::VerticallyArrived,
            (false, false) => ShipPhase::Approaching,
        }
    }

    /// 未処理の到着通知を取り出す
    pub fn take_events(&mut self) -> Vec<ArrivalEvent> {
        self.notifier.drain()
    }

    /// 1ティックあたりの最大回転量（度）
    ///
    /// 移動・回転速度が大きいほど速く向きを変えます。
    pub fn rotation_step_degrees(&self) -> f64 {
        let base = self.tuning.travel_speed * self.tuning.rotation_rate;
        base + base
            * self.modifiers.rotation
            * (self.travel.velocity() + self.rotation.velocity())
    }

    /// 目標への移動処理（固定時間刻み）
    pub fn move_to_target(&mut self, dt: f64) {
        let Some(mut target) = self.target else {
            return;
        };

        let position = self.transform.position;
        let forward = self.transform.forward();
        let to_target = target.beacon.position - position;
        self.distance_to_target = to_target.length();
        self.angle_to_target = math_utils::angle_between_deg(forward, to_target);
        target.direction = to_target;

        let should_rotate = self.angle_to_target > self.tuning.rotation_gate_angle_deg
            && self.distance_to_target > self.tuning.rotation_gate_distance;
        self.rotation.update(should_rotate, dt);

        // 至近距離では接近角度による揺れを避けるため最終的な向きを直接目指す
        target.rotation_target = if self.distance_to_target < self.tuning.final_facing_distance {
            target.final_rotation
        } else {
            let look = math_utils::rotate_direction_towards(forward, to_target, self.tuning.max_turn_radians);
            math_utils::look_rotation(look).unwrap_or(target.rotation_target)
        };
        self.transform.rotation = math_utils::rotate_towards(
            self.transform.rotation,
            target.rotation_target,
            self.rotation_step_degrees(),
        );
        self.target = Some(target);

        // 両軸到着済み（到着不許可中は完了待ち）なら位置を保持する
        if self.arrival.both() {
            return;
        }

        if self.distance_to_target < self.tuning.near_target_distance {
            self.modifiers.select_by_angle(self.angle_to_target, &self.tuning);
        }

        let decel_distance = target.initial_distance * self.tuning.decel_onset_fraction;
        self.travel
            .update_by_distance(self.distance_to_target, decel_distance, dt);

        let beacon_position = target.beacon.position;
        let vertical_distance = math_utils::vertical_distance(position, beacon_position);
        let horizontal_distance = math_utils::horizontal_distance(position, beacon_position);
        self.modifiers
            .balance_axes(horizontal_distance, vertical_distance);

        let travel_step =
            self.tuning.travel_speed * self.travel.velocity() * self.modifiers.travel * dt;

        if !self.arrival.vertical {
            let direction = DVec3::new(0.0, to_target.y, 0.0).normalize_or_zero();
            let step = travel_step * self.modifiers.vertical;
            self.arrival.vertical = self.advance_axis(direction, step, vertical_distance);
        }

        if !self.arrival.horizontal {
            let direction = math_utils::flatten(self.transform.forward()).normalize_or_zero();
            let step = travel_step * self.modifiers.horizontal;
            self.arrival.horizontal = self.advance_axis(direction, step, horizontal_distance);
        }

        trace!(
            ship = %self.id,
            distance = self.distance_to_target,
            angle = self.angle_to_target,
            travel_velocity = self.travel.velocity(),
            rotation_velocity = self.rotation.velocity(),
            "艦の移動ティック"
        );

        if self.arrival.both() {
            if self.allowed_to_arrive {
                self.complete_arrival();
            } else {
                debug!("艦 {} は到着不許可のため完了を保留", self.id);
            }
        }
    }

    /// 1軸分の移動を適用し、その軸が到着したかを返す
    ///
    /// 移動量がNaNの場合は移動せずに到着扱いにします。
    fn advance_axis(&mut self, direction: DVec3, step: f64, remaining: f64) -> bool {
        if step.is_nan() {
            return true;
        }
        self.transform.translate(direction * step);
        remaining < step + self.tuning.arrival_epsilon
    }

    fn complete_arrival(&mut self) {
        let Some(target) = self.target else {
            return;
        };
        // 浮動小数点の残差を消すため目標位置に合わせる
        self.transform.position = target.beacon.position;
        if self.notifier.arrive() {
            info!(
                "艦 {} が目標に到着しました (指示 #{}, 位置: {:.2}, {:.2}, {:.2})",
                self.id,
                self.notifier.order(),
                target.beacon.position.x,
                target.beacon.position.y,
                target.beacon.position.z
            );
        }
    }
}

impl IAgent for LightShip {
    fn tick(&mut self, dt: f64) {
        if self.is_active() {
            self.move_to_target(dt);
        }
    }

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

impl IMovable for LightShip {
    fn get_position(&self) -> DVec3 {
        self.transform.position
    }

    fn get_rotation(&self) -> DQuat {
        self.transform.rotation
    }

    fn set_position(&mut self, position: DVec3) {
        self.transform.position = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::events::ArrivalTransition;

    const DT: f64 = 0.02;

    fn ship_at_origin() -> LightShip {
        LightShip::new("LS001".to_string(), Transform::default())
    }

    fn run_until_arrived(ship: &mut LightShip, max_ticks: usize) -> usize {
        for n in 0..max_ticks {
            if ship.has_arrived() {
                return n;
            }
            ship.tick(DT);
        }
        panic!("艦が {} ティック以内に到着しませんでした", max_ticks);
    }

    #[test]
    fn test_straight_line_arrival_fires_once() {
        let mut ship = ship_at_origin();
        let target = DVec3::new(0.0, 0.0, 20.0);
        ship.set_target(Beacon::new(target, 0.0));

        run_until_arrived(&mut ship, 1000);
        assert_eq!(ship.get_position(), target);
        assert_eq!(ship.phase(), ShipPhase::FullyArrived);

        for _ in 0..50 {
            ship.tick(DT);
        }
        assert_eq!(ship.get_position(), target);

        let events = ship.take_events();
        let transitions: Vec<_> = events.iter().map(|e| e.transition).collect();
        assert_eq!(
            transitions,
            vec![ArrivalTransition::Assigned, ArrivalTransition::Arrived]
        );
    }

    #[test]
    fn test_reassign_after_horizontal_arrival_restarts_from_rest() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 20.0), 0.0));
        run_until_arrived(&mut ship, 1000);
        assert!(ship.travel_velocity() > 0.0);

        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 60.0), 0.0));
        assert_eq!(ship.travel_velocity(), 0.0);
        assert_eq!(ship.phase(), ShipPhase::Approaching);
    }

    #[test]
    fn test_reassign_mid_transit_keeps_velocity() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 100.0), 0.0));
        for _ in 0..10 {
            ship.tick(DT);
        }
        let before = ship.travel_velocity();
        assert!((before - 0.2).abs() < 1e-9);

        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 200.0), 0.0));
        assert_eq!(ship.travel_velocity(), before);
        assert_eq!(ship.modifiers(), SpeedModifiers::default());
    }

    #[test]
    fn test_decel_onset_is_captured_at_assignment() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 50.0), 0.0));
        for _ in 0..20 {
            ship.tick(DT);
        }
        assert!((ship.decel_onset_distance().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_closed_gate_suspends_arrival() {
        let mut ship = ship_at_origin();
        let target = DVec3::new(0.0, 0.0, 0.2);
        ship.set_target(Beacon::new(target, 0.0));
        ship.set_allowed_to_arrive(false);

        ship.tick(DT);
        assert!(!ship.is_horizontally_arrived());
        assert!(!ship.is_vertically_arrived());
        assert!(!ship.has_arrived());
        assert_ne!(ship.get_position(), target);
        assert!(ship.travel_velocity() > 0.0);

        // 両軸到着済みの間は保留したまま位置を保持する
        let held = ship.get_position();
        for _ in 0..5 {
            ship.tick(DT);
        }
        assert_eq!(ship.get_position(), held);
        assert!(!ship.has_arrived());

        ship.set_allowed_to_arrive(true);
        assert!(ship.has_arrived());
        assert_eq!(ship.get_position(), target);

        let arrivals = ship
            .take_events()
            .iter()
            .filter(|e| e.transition.arrived())
            .count();
        assert_eq!(arrivals, 1);
    }

    #[test]
    fn test_reassign_while_gated_keeps_velocity() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 20.0), 0.0));
        ship.set_allowed_to_arrive(false);
        for _ in 0..1000 {
            ship.tick(DT);
        }
        assert!(!ship.is_horizontally_arrived());
        let before = ship.travel_velocity();
        assert!(before > 0.0);

        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 60.0), 0.0));
        assert_eq!(ship.travel_velocity(), before);
        assert_eq!(ship.phase(), ShipPhase::Approaching);
    }

    #[test]
    fn test_closing_gate_after_arrival_masks_flags() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 20.0), 0.0));
        run_until_arrived(&mut ship, 1000);

        ship.set_allowed_to_arrive(false);
        ship.tick(DT);
        assert!(!ship.is_horizontally_arrived());
        assert!(!ship.is_vertically_arrived());
        assert_eq!(ship.phase(), ShipPhase::Approaching);

        ship.set_allowed_to_arrive(true);
        assert!(ship.has_arrived());
        let arrivals = ship
            .take_events()
            .iter()
            .filter(|e| e.transition.arrived())
            .count();
        assert_eq!(arrivals, 1);
    }

    #[test]
    fn test_zero_distance_target_arrives_without_nan() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::ZERO, 0.0));
        ship.tick(DT);

        assert!(ship.has_arrived());
        assert!(ship.get_position().is_finite());
        assert_eq!(ship.get_position(), DVec3::ZERO);
    }

    #[test]
    fn test_axis_balance_throttles_shorter_axis() {
        assert_eq!(axis_balance(20.0, 10.0), (1.0, 0.5));
        assert_eq!(axis_balance(10.0, 20.0), (0.5, 1.0));
        assert!(axis_balance(0.0, 0.0).0.is_nan());
    }

    #[test]
    fn test_vertical_and_horizontal_arrive_together() {
        let mut ship = ship_at_origin();
        let target = DVec3::new(0.0, 10.0, 20.0);
        ship.set_target(Beacon::new(target, 0.0));

        ship.tick(DT);
        assert_eq!(ship.modifiers().horizontal, 1.0);
        assert!((ship.modifiers().vertical - 0.5).abs() < 1e-9);

        run_until_arrived(&mut ship, 2000);
        assert_eq!(ship.get_position(), target);
    }

    #[test]
    fn test_large_angle_near_target_favours_rotation() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(10.0, 0.0, 0.0), 90.0));
        ship.tick(DT);

        let modifiers = ship.modifiers();
        assert_eq!(modifiers.rotation, 1.5);
        assert_eq!(modifiers.travel, 0.5);
        assert!(ship.rotation_velocity() > 0.0);
    }

    #[test]
    fn test_turns_towards_target_then_arrives() {
        let mut ship = ship_at_origin();
        let target = DVec3::new(30.0, 0.0, 0.0);
        ship.set_target(Beacon::new(target, 90.0));

        ship.tick(DT);
        assert!(math_utils::angle_between_deg(ship.get_forward(), DVec3::X) < 90.0);

        run_until_arrived(&mut ship, 3000);
        assert_eq!(ship.get_position(), target);
    }

    #[test]
    fn test_final_facing_inside_one_unit() {
        let mut ship = ship_at_origin();
        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 0.5), 90.0));
        ship.tick(DT);

        // 目標は正面だが、最終的な向き（+X）へ回り始める
        assert!(math_utils::angle_between_deg(ship.get_forward(), DVec3::X) < 89.0);
    }

    #[test]
    fn test_no_target_is_noop() {
        let mut ship = ship_at_origin();
        ship.tick(DT);
        assert_eq!(ship.phase(), ShipPhase::Idle);
        assert_eq!(ship.get_position(), DVec3::ZERO);

        ship.set_target(Beacon::new(DVec3::new(0.0, 0.0, 10.0), 0.0));
        ship.remove_target();
        ship.tick(DT);
        assert_eq!(ship.get_position(), DVec3::ZERO);
        assert!(ship.target_position().is_none());
    }
}
