use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// 位置と回転を保持するトランスフォーム
///
/// Y軸が上方向、+Z軸が前方向の座標系です。
/// 移動コントローラはこの構造体を毎ティック読み書きします。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Transform {
    pub fn new(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    /// ヨー角（度）から作成
    pub fn from_heading(position: DVec3, heading_deg: f64) -> Self {
        Self::new(position, math_utils::heading_rotation(heading_deg))
    }

    /// 前方向ベクトル
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::Z
    }

    /// 右方向ベクトル
    pub fn right(&self) -> DVec3 {
        self.rotation * DVec3::X
    }

    /// 上方向ベクトル
    pub fn up(&self) -> DVec3 {
        self.rotation * DVec3::Y
    }

    /// ワールド座標系で平行移動
    pub fn translate(&mut self, delta: DVec3) {
        self.position += delta;
    }

    /// ローカルY軸まわりに回転（度）
    pub fn rotate_local_y(&mut self, degrees: f64) {
        self.rotation = (self.rotation * DQuat::from_rotation_y(degrees.to_radians())).normalize();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(DVec3::ZERO, DQuat::IDENTITY)
    }
}

/// 移動目標となるビーコン
///
/// 目標位置と最終的な向きを持ちます。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Beacon {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Beacon {
    pub fn new(position: DVec3, heading_deg: f64) -> Self {
        Self {
            position,
            rotation: math_utils::heading_rotation(heading_deg),
        }
    }

    /// ビーコンの前方向ベクトル
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::Z
    }
}

/// エージェントの状態を表す列挙型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentStatus {
    Active,   // アクティブ
    Inactive, // 非アクティブ
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use super::*;

    /// 長さがこれ未満のベクトルは方向を持たないものとして扱う
    pub const DIRECTION_EPSILON: f64 = 1e-9;

    /// ヨー角（度）からY軸回転を作成
    pub fn heading_rotation(heading_deg: f64) -> DQuat {
        DQuat::from_rotation_y(heading_deg.to_radians())
    }

    /// 角度を0度〜360度の範囲に正規化
    pub fn wrap_degrees(angle_deg: f64) -> f64 {
        angle_deg.rem_euclid(360.0)
    }

    /// 2つのベクトルのなす角（度）
    ///
    /// どちらかが零ベクトルの場合は0度を返します。
    pub fn angle_between_deg(a: DVec3, b: DVec3) -> f64 {
        if a.length() < DIRECTION_EPSILON || b.length() < DIRECTION_EPSILON {
            return 0.0;
        }
        let cos = (a.dot(b) / (a.length() * b.length())).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }

    /// 水平成分（XZ平面）のみを取り出す
    pub fn flatten(v: DVec3) -> DVec3 {
        DVec3::new(v.x, 0.0, v.z)
    }

    /// XZ平面での距離
    pub fn horizontal_distance(a: DVec3, b: DVec3) -> f64 {
        flatten(a - b).length()
    }

    /// 高さ方向の距離
    pub fn vertical_distance(a: DVec3, b: DVec3) -> f64 {
        (a.y - b.y).abs()
    }

    /// `forward`方向を向く回転を作成（上方向は+Y）
    ///
    /// `forward`が零ベクトルの場合は`None`を返します。
    pub fn look_rotation(forward: DVec3) -> Option<DQuat> {
        let f = forward.try_normalize()?;
        let right = DVec3::Y.cross(f).try_normalize().unwrap_or(DVec3::X);
        let up = f.cross(right);
        Some(DQuat::from_mat3(&DMat3::from_cols(right, up, f)).normalize())
    }

    /// 方向ベクトルを目標方向へ最大`max_radians`だけ回転させる
    ///
    /// 戻り値は単位ベクトルです。どちらかが零ベクトルの場合は`current`の方向を維持します。
    pub fn rotate_direction_towards(current: DVec3, target: DVec3, max_radians: f64) -> DVec3 {
        let (Some(from), Some(to)) = (current.try_normalize(), target.try_normalize()) else {
            return current.normalize_or_zero();
        };
        let angle = from.angle_between(to);
        if angle <= max_radians {
            return to;
        }
        let axis = from
            .cross(to)
            .try_normalize()
            .unwrap_or_else(|| from.any_orthonormal_vector());
        (DQuat::from_axis_angle(axis, max_radians) * from).normalize()
    }

    /// 回転を目標回転へ最大`max_degrees`だけ近づける
    pub fn rotate_towards(from: DQuat, to: DQuat, max_degrees: f64) -> DQuat {
        let angle = from.angle_between(to);
        if !angle.is_finite() || angle < DIRECTION_EPSILON {
            return to;
        }
        let step = max_degrees.max(0.0).to_radians();
        if step >= angle {
            return to;
        }
        from.slerp(to, step / angle).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::math_utils::*;
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_heading_forward() {
        let t = Transform::from_heading(DVec3::ZERO, 90.0);
        assert!((t.forward() - DVec3::X).length() < EPS);
        assert!((Transform::default().forward() - DVec3::Z).length() < EPS);
    }

    #[test]
    fn test_look_rotation_matches_heading() {
        let q = look_rotation(DVec3::new(5.0, 0.0, 0.0)).unwrap();
        assert!((q * DVec3::Z - DVec3::X).length() < EPS);
        assert!((q * DVec3::Y - DVec3::Y).length() < EPS);
        assert!(look_rotation(DVec3::ZERO).is_none());

        let straight_up = look_rotation(DVec3::Y).unwrap();
        assert!((straight_up * DVec3::Z - DVec3::Y).length() < EPS);
    }

    #[test]
    fn test_angle_between_deg() {
        assert!((angle_between_deg(DVec3::Z, DVec3::X) - 90.0).abs() < 1e-6);
        assert_eq!(angle_between_deg(DVec3::ZERO, DVec3::X), 0.0);
    }

    #[test]
    fn test_rotate_direction_towards_is_bounded() {
        let step = 10f64.to_radians();
        let dir = rotate_direction_towards(DVec3::Z, DVec3::X, step);
        assert!((angle_between_deg(DVec3::Z, dir) - 10.0).abs() < 1e-6);

        let unbounded = rotate_direction_towards(DVec3::Z, DVec3::X * 3.0, 360.0);
        assert!((unbounded - DVec3::X).length() < EPS);
    }

    #[test]
    fn test_rotate_towards_steps_and_finishes() {
        let to = heading_rotation(90.0);
        let half = rotate_towards(DQuat::IDENTITY, to, 45.0);
        assert!((half.angle_between(to).to_degrees() - 45.0).abs() < 1e-6);
        assert_eq!(rotate_towards(half, to, 90.0), to);
    }

    #[test]
    fn test_axis_distances() {
        let a = DVec3::new(0.0, 10.0, 0.0);
        let b = DVec3::new(3.0, 4.0, 4.0);
        assert!((horizontal_distance(a, b) - 5.0).abs() < EPS);
        assert!((vertical_distance(a, b) - 6.0).abs() < EPS);
        assert_eq!(wrap_degrees(-30.0), 330.0);
    }
}
