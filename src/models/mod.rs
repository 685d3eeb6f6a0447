// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// 加減速ランプ
pub mod velocity;

// 各エージェントモデルの実装
pub mod ship;
pub mod camera;
pub mod selection;
pub mod events;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use velocity::VelocityRamp;
pub use ship::{LightShip, ShipTuning, ShipPhase, SpeedModifiers, ArrivalFlags, axis_balance};
pub use camera::{RtsCameraRig, CameraTuning};
pub use selection::{SelectionGroup, centroid, average_height};
pub use events::{ArrivalEvent, ArrivalTransition, ArrivalState, ArrivalNotifier, EventRecorder, RecordedEvent, EventLogError};
