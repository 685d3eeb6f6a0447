use glam::{DQuat, DVec2, DVec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::models::{
    common::{math_utils, AgentStatus, Transform},
    traits::{IAgent, IMovable},
    velocity::VelocityRamp,
};

/// RTSカメラのパラメータ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraTuning {
    /// パン速度（ズーム距離の平方根で拡大される）
    pub move_speed: f64,
    pub move_accel: f64,
    pub move_decel: f64,
    /// 回転速度（度/秒）
    pub rotation_speed: f64,
    pub rotation_accel: f64,
    pub rotation_decel: f64,
    pub zoom_speed: f64,
    pub zoom_accel: f64,
    pub zoom_decel: f64,
    pub min_zoom: f64,
    pub max_zoom_out: f64,
    /// 初期アーム長
    pub default_arm_length: f64,
    pub invert_vertical_rotation: bool,
    pub invert_horizontal_rotation: bool,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            move_speed: 15.0,
            move_accel: 2.0,
            move_decel: 3.0,
            rotation_speed: 25.0,
            rotation_accel: 5.0,
            rotation_decel: 4.5,
            zoom_speed: 7.0,
            zoom_accel: 8.0,
            zoom_decel: 3.0,
            min_zoom: 1.0,
            max_zoom_out: 200.0,
            default_arm_length: 5.0,
            invert_vertical_rotation: false,
            invert_horizontal_rotation: false,
        }
    }
}

/// RTSカメラリグ
///
/// リグ本体（ヨー回転と平行移動）、子のピボット（ピッチ）、さらにその子の
/// カメラホルダー（ズーム距離）の3段構成です。パン・回転・ズームはそれぞれ
/// 入力の押下状態で加減速するランプを持ちます。
#[derive(Debug, Clone)]
pub struct RtsCameraRig {
    pub id: String,
    pub transform: Transform,
    pub tuning: CameraTuning,
    pub status: AgentStatus,

    /// ピボットのピッチ角（度、0〜360）
    pivot_pitch_deg: f64,
    /// カメラホルダーのローカル位置（z = -ズーム距離）
    holder_local: DVec3,
    zoom_distance: f64,

    horizontal_move_direction: DVec2,
    horizontal_move_held: bool,
    horizontal_move: VelocityRamp,
    vertical_move_direction: f64,
    vertical_move_held: bool,
    vertical_move: VelocityRamp,

    rotation_direction: DVec2,
    rotation_toggle: bool,
    rotation_held: bool,
    rotation: VelocityRamp,

    zoom_direction: f64,
    zoom_held: bool,
    zoom: VelocityRamp,

    following: bool,
    group_anchor: Option<DVec3>,
    group_member_count: usize,
}

impl RtsCameraRig {
    pub fn new(id: String, transform: Transform, tuning: CameraTuning) -> Self {
        let arm = tuning.default_arm_length;
        Self {
            id,
            transform,
            tuning,
            status: AgentStatus::Active,
            pivot_pitch_deg: 0.0,
            holder_local: DVec3::new(0.0, 0.0, -arm),
            zoom_distance: arm,
            horizontal_move_direction: DVec2::ZERO,
            horizontal_move_held: false,
            horizontal_move: VelocityRamp::new(tuning.move_accel, tuning.move_decel),
            vertical_move_direction: 0.0,
            vertical_move_held: false,
            vertical_move: VelocityRamp::new(tuning.move_accel, tuning.move_decel),
            rotation_direction: DVec2::ZERO,
            rotation_toggle: false,
            rotation_held: false,
            rotation: VelocityRamp::new(tuning.rotation_accel, tuning.rotation_decel),
            zoom_direction: 0.0,
            zoom_held: false,
            zoom: VelocityRamp::new(tuning.zoom_accel, tuning.zoom_decel),
            following: false,
            group_anchor: None,
            group_member_count: 0,
        }
    }

    /// 水平移動入力（`None`で離す）
    pub fn input_move_horizontal(&mut self, direction: Option<DVec2>) {
        match direction {
            Some(direction) => {
                self.horizontal_move_held = true;
                self.horizontal_move_direction = direction;
            }
            None => self.horizontal_move_held = false,
        }
    }

    /// 垂直移動入力（`None`で離す）
    pub fn input_move_vertical(&mut self, direction: Option<f64>) {
        match direction {
            Some(direction) => {
                self.vertical_move_held = true;
                self.vertical_move_direction = direction;
            }
            None => self.vertical_move_held = false,
        }
    }

    /// 回転入力（回転トグルが押されている間のみ受け付ける）
    pub fn input_rotation(&mut self, direction: Option<DVec2>) {
        match direction {
            Some(direction) if self.rotation_toggle => {
                self.rotation_held = true;
                self.rotation_direction = direction;
            }
            Some(_) => {}
            None => self.rotation_held = false,
        }
    }

    /// 回転トグル（離すと回転入力も解除）
    pub fn input_rotation_toggle(&mut self, pressed: bool) {
        self.rotation_toggle = pressed;
        if !pressed {
            self.rotation_held = false;
        }
    }

    /// ズーム入力（0で離す、正でズームイン）
    pub fn input_zoom(&mut self, direction: f64) {
        if direction != 0.0 {
            self.zoom_held = true;
            self.zoom_direction = direction;
        } else {
            self.zoom_held = false;
        }
    }

    /// グループ追従の切り替え
    ///
    /// 追従中なら解除し、そうでなければ選択グループが空でない場合に
    /// グループ原点へ移動して追従を開始します。
    pub fn input_attach_to_group(&mut self) {
        if self.following {
            self.following = false;
            debug!("カメラ {} のグループ追従を解除", self.id);
        } else if let Some(anchor) = self.group_anchor {
            if self.group_member_count > 0 {
                self.following = true;
                self.transform.position = anchor;
                debug!("カメラ {} がグループ追従を開始", self.id);
            }
        }
    }

    /// 追従対象のグループ原点と所属数を設定（毎フレーム）
    pub fn set_group_anchor(&mut self, anchor: Option<DVec3>, member_count: usize) {
        self.group_anchor = anchor;
        self.group_member_count = member_count;
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    pub fn zoom_distance(&self) -> f64 {
        self.zoom_distance
    }

    pub fn pitch_deg(&self) -> f64 {
        self.pivot_pitch_deg
    }

    /// リグのヨー角（度）
    pub fn yaw_deg(&self) -> f64 {
        let forward = self.transform.forward();
        math_utils::wrap_degrees(forward.x.atan2(forward.z).to_degrees())
    }

    pub fn horizontal_move_velocity(&self) -> f64 {
        self.horizontal_move.velocity()
    }

    pub fn vertical_move_velocity(&self) -> f64 {
        self.vertical_move.velocity()
    }

    pub fn rotation_velocity(&self) -> f64 {
        self.rotation.velocity()
    }

    pub fn zoom_velocity(&self) -> f64 {
        self.zoom.velocity()
    }

    /// ピボットのワールド回転
    pub fn pivot_rotation(&self) -> DQuat {
        self.transform.rotation * DQuat::from_rotation_x(self.pivot_pitch_deg.to_radians())
    }

    /// カメラホルダーのワールド位置
    pub fn camera_position(&self) -> DVec3 {
        self.transform.position + self.pivot_rotation() * self.holder_local
    }

    /// 1フレーム更新（可変時間刻み）
    pub fn update(&mut self, dt: f64) {
        self.update_movement(dt);
        self.update_rotation(dt);
        self.update_zoom(dt);

        trace!(
            camera = %self.id,
            x = self.transform.position.x,
            y = self.transform.position.y,
            z = self.transform.position.z,
            yaw = self.yaw_deg(),
            pitch = self.pivot_pitch_deg,
            zoom = self.zoom_distance,
            "カメラ更新"
        );
    }

    fn update_movement(&mut self, dt: f64) {
        self.horizontal_move.update(self.horizontal_move_held, dt);
        self.vertical_move.update(self.vertical_move_held, dt);

        // ズームアウト時ほど速くパンするが、平方根で伸びを抑える
        let zoom_scale = self.zoom_distance.sqrt();
        let horizontal_speed =
            self.tuning.move_speed * self.horizontal_move.velocity() * zoom_scale * dt;
        let vertical_speed =
            self.tuning.move_speed * self.vertical_move.velocity() * zoom_scale * dt;

        let forward = self.transform.forward() * self.horizontal_move_direction.y * horizontal_speed;
        let side = self.transform.right() * self.horizontal_move_direction.x * horizontal_speed;
        let horizontal = forward + side;
        let vertical = self.transform.up() * self.vertical_move_direction * vertical_speed;

        self.check_stop_following(horizontal, vertical);

        if self.following {
            if let Some(anchor) = self.group_anchor {
                self.transform.position = anchor;
            }
        } else {
            self.transform.translate(horizontal + vertical);
        }
    }

    /// 手動移動またはグループが空になったら追従を解除
    fn check_stop_following(&mut self, horizontal: DVec3, vertical: DVec3) {
        if !self.following {
            return;
        }
        let moved = horizontal.length() > 0.0 || vertical.length() > 0.0;
        let group_empty = self.group_anchor.is_none() || self.group_member_count == 0;
        if moved || group_empty {
            self.following = false;
            debug!(
                "カメラ {} のグループ追従を自動解除 (手動移動: {}, グループ空: {})",
                self.id, moved, group_empty
            );
        }
    }

    fn update_rotation(&mut self, dt: f64) {
        self.rotation
            .update(self.rotation_toggle && self.rotation_held, dt);
        let speed = self.tuning.rotation_speed * self.rotation.velocity() * dt;

        let yaw = if self.tuning.invert_horizontal_rotation {
            -self.rotation_direction.x
        } else {
            self.rotation_direction.x
        };
        self.transform.rotate_local_y(yaw * speed);

        let pitch = if self.tuning.invert_vertical_rotation {
            self.rotation_direction.y
        } else {
            -self.rotation_direction.y
        };
        self.pivot_pitch_deg = math_utils::wrap_degrees(self.pivot_pitch_deg + pitch * speed);
    }

    fn update_zoom(&mut self, dt: f64) {
        self.zoom.update(self.zoom_held, dt);
        let change = self.tuning.zoom_speed * self.zoom.velocity() * dt;
        self.zoom_distance = (self.holder_local.z.abs() - self.zoom_direction * change)
            .clamp(self.tuning.min_zoom, self.tuning.max_zoom_out);
        self.holder_local.z = -self.zoom_distance;
    }
}

impl IAgent for RtsCameraRig {
    fn tick(&mut self, dt: f64) {
        if self.is_active() {
            self.update(dt);
        }
    }

    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

impl IMovable for RtsCameraRig {
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

    const DT: f64 = 0.1;

    fn rig() -> RtsCameraRig {
        RtsCameraRig::new("CAM".to_string(), Transform::default(), CameraTuning::default())
    }

    #[test]
    fn test_pan_speed_scales_with_zoom() {
        let mut camera = rig();
        camera.input_move_horizontal(Some(DVec2::new(0.0, 1.0)));
        camera.tick(DT);

        let expected = 15.0 * 0.2 * 5f64.sqrt() * DT;
        assert!((camera.get_position().z - expected).abs() < 1e-9);
        assert!(camera.get_position().x.abs() < 1e-9);
    }

    #[test]
    fn test_release_decelerates_to_rest() {
        let mut camera = rig();
        camera.input_move_horizontal(Some(DVec2::new(1.0, 0.0)));
        for _ in 0..10 {
            camera.tick(DT);
        }
        assert_eq!(camera.horizontal_move_velocity(), 1.0);

        camera.input_move_horizontal(None);
        camera.tick(DT);
        assert!((camera.horizontal_move_velocity() - 0.7).abs() < 1e-9);
        for _ in 0..10 {
            camera.tick(DT);
        }
        assert_eq!(camera.horizontal_move_velocity(), 0.0);

        let resting = camera.get_position();
        camera.tick(DT);
        assert_eq!(camera.get_position(), resting);
    }

    #[test]
    fn test_vertical_pan_moves_up() {
        let mut camera = rig();
        camera.input_move_vertical(Some(1.0));
        camera.tick(DT);
        assert!(camera.get_position().y > 0.0);
    }

    #[test]
    fn test_rotation_requires_toggle() {
        let mut camera = rig();
        camera.input_rotation(Some(DVec2::new(1.0, 0.0)));
        camera.tick(DT);
        assert_eq!(camera.rotation_velocity(), 0.0);

        camera.input_rotation_toggle(true);
        camera.input_rotation(Some(DVec2::new(1.0, 1.0)));
        camera.tick(DT);
        assert!(camera.rotation_velocity() > 0.0);

        let step = 25.0 * 0.5 * DT;
        assert!((camera.yaw_deg() - step).abs() < 1e-6);
        assert!((camera.pitch_deg() - (360.0 - step)).abs() < 1e-6);

        camera.input_rotation_toggle(false);
        camera.tick(DT);
        assert!(camera.rotation_velocity() < 0.5);
    }

    #[test]
    fn test_inverted_rotation() {
        let tuning = CameraTuning {
            invert_horizontal_rotation: true,
            invert_vertical_rotation: true,
            ..CameraTuning::default()
        };
        let mut camera = RtsCameraRig::new("CAM".to_string(), Transform::default(), tuning);
        camera.input_rotation_toggle(true);
        camera.input_rotation(Some(DVec2::new(1.0, 1.0)));
        camera.tick(DT);

        let step = 25.0 * 0.5 * DT;
        assert!((camera.yaw_deg() - (360.0 - step)).abs() < 1e-6);
        assert!((camera.pitch_deg() - step).abs() < 1e-6);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = rig();
        camera.input_zoom(1.0);
        for _ in 0..100 {
            camera.tick(DT);
        }
        assert_eq!(camera.zoom_distance(), 1.0);

        camera.input_zoom(-1.0);
        for _ in 0..1000 {
            camera.tick(DT);
        }
        assert_eq!(camera.zoom_distance(), 200.0);
        assert!((camera.camera_position() - DVec3::new(0.0, 0.0, -200.0)).length() < 1e-9);
    }

    #[test]
    fn test_attach_follows_group_until_manual_move() {
        let mut camera = rig();
        let anchor = DVec3::new(10.0, 0.0, 10.0);
        camera.input_attach_to_group();
        assert!(!camera.is_following());

        camera.set_group_anchor(Some(anchor), 2);
        camera.input_attach_to_group();
        assert!(camera.is_following());
        assert_eq!(camera.get_position(), anchor);

        let moved = DVec3::new(12.0, 0.0, 10.0);
        camera.set_group_anchor(Some(moved), 2);
        camera.tick(DT);
        assert_eq!(camera.get_position(), moved);

        camera.input_move_horizontal(Some(DVec2::new(1.0, 0.0)));
        camera.tick(DT);
        assert!(!camera.is_following());
        assert!(camera.get_position().x > moved.x);
    }

    #[test]
    fn test_empty_group_breaks_follow() {
        let mut camera = rig();
        camera.set_group_anchor(Some(DVec3::ZERO), 1);
        camera.input_attach_to_group();
        assert!(camera.is_following());

        camera.set_group_anchor(None, 0);
        camera.tick(DT);
        assert!(!camera.is_following());
    }

    #[test]
    fn test_attach_toggle_detaches() {
        let mut camera = rig();
        camera.set_group_anchor(Some(DVec3::ONE), 3);
        camera.input_attach_to_group();
        camera.input_attach_to_group();
        assert!(!camera.is_following());
    }
}
