use glam::{DQuat, DVec3};

/// 全ての移動エージェントが実装する基本インターフェース
pub trait IAgent {
    /// 1ティックの処理実行
    fn tick(&mut self, dt: f64);

    /// エージェントIDの取得
    fn get_id(&self) -> String;

    /// エージェントがアクティブかどうか
    fn is_active(&self) -> bool;
}

/// トランスフォームを持つエージェントのインターフェース
pub trait IMovable {
    /// 現在位置の取得
    fn get_position(&self) -> DVec3;

    /// 現在回転の取得
    fn get_rotation(&self) -> DQuat;

    /// 前方向ベクトルの取得
    fn get_forward(&self) -> DVec3 {
        self.get_rotation() * DVec3::Z
    }

    /// 位置の設定
    fn set_position(&mut self, position: DVec3);
}
