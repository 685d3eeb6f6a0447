use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glam::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::models::{CameraTuning, ShipTuning};

/// 組み込みデモシナリオ
pub const DEMO_SCENARIO: &str = include_str!("../scenarios/demo.yaml");

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
///
/// 艦の移動は固定時間刻み、カメラと選択グループはフレーム時間刻みで更新します。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub fixed_dt_s: f64,
    pub frame_dt_s: f64,
    pub t_max_s: f64,
    /// 全艦が到着し予定イベントが尽きたら終了する
    #[serde(default = "default_true")]
    pub stop_when_idle: bool,
}

fn default_true() -> bool {
    true
}

/// ログ設定（コマンドライン引数で上書き可能）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub output: Option<String>,
    pub log_dir: Option<String>,
}

/// ビーコン設定
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BeaconConfig {
    pub position: DVec3,
    #[serde(default)]
    pub heading_deg: f64,
}

/// 艦への移動指示（`beacon`省略で目標解除）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShipOrderConfig {
    pub time_s: f64,
    #[serde(default)]
    pub beacon: Option<BeaconConfig>,
}

/// 到着許可の変更
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GateChangeConfig {
    pub time_s: f64,
    pub allowed: bool,
}

/// 艦設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShipConfig {
    pub id: String,
    pub position: DVec3,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub tuning: ShipTuning,
    #[serde(default)]
    pub orders: Vec<ShipOrderConfig>,
    #[serde(default)]
    pub arrival_gate: Vec<GateChangeConfig>,
}

/// カメラ入力
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CameraInput {
    /// 水平パン（`value`省略で離す）
    MoveHorizontal {
        #[serde(default)]
        value: Option<DVec2>,
    },
    /// 垂直パン（`value`省略で離す）
    MoveVertical {
        #[serde(default)]
        value: Option<f64>,
    },
    /// 回転（`value`省略で離す）
    Rotate {
        #[serde(default)]
        value: Option<DVec2>,
    },
    RotationToggle {
        pressed: bool,
    },
    /// ズーム（0で離す）
    Zoom {
        value: f64,
    },
    AttachToGroup,
}

/// 時刻付きカメラ入力
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraInputEvent {
    pub time_s: f64,
    #[serde(flatten)]
    pub input: CameraInput,
}

/// カメラ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    #[serde(default = "default_camera_id")]
    pub id: String,
    #[serde(default)]
    pub position: DVec3,
    #[serde(default)]
    pub heading_deg: f64,
    #[serde(default)]
    pub tuning: CameraTuning,
    #[serde(default)]
    pub inputs: Vec<CameraInputEvent>,
}

fn default_camera_id() -> String {
    "CAM001".to_string()
}

/// 選択グループの変更
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SelectionChange {
    Select { id: String },
    Deselect { id: String },
    SetOrderBeacon {
        #[serde(default)]
        position: Option<DVec3>,
    },
}

/// 時刻付き選択変更
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionChangeEvent {
    pub time_s: f64,
    #[serde(flatten)]
    pub change: SelectionChange,
}

/// 選択グループ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectionConfig {
    #[serde(default = "default_group_id")]
    pub id: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub order_beacon: Option<DVec3>,
    #[serde(default)]
    pub changes: Vec<SelectionChangeEvent>,
}

fn default_group_id() -> String {
    "G001".to_string()
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub ships: Vec<ShipConfig>,
    #[serde(default)]
    pub camera: Option<CameraConfig>,
    #[serde(default)]
    pub selection: Option<SelectionConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 組み込みデモシナリオ
    pub fn demo() -> Result<Self, ScenarioError> {
        Self::from_yaml_str(DEMO_SCENARIO)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sim.fixed_dt_s <= 0.0 {
            return Err(validation("fixed_dt_s must be positive"));
        }
        if self.sim.frame_dt_s <= 0.0 {
            return Err(validation("frame_dt_s must be positive"));
        }
        if self.sim.t_max_s <= 0.0 {
            return Err(validation("t_max_s must be positive"));
        }

        let mut ship_ids = HashSet::new();
        for ship in &self.ships {
            if ship.id.is_empty() {
                return Err(validation("ship id must not be empty"));
            }
            if !ship_ids.insert(ship.id.as_str()) {
                return Err(validation(format!("duplicate ship id {}", ship.id)));
            }
            self.validate_ship_tuning(&ship.id, &ship.tuning)?;
            for order in &ship.orders {
                self.validate_time(&format!("ship {} order", ship.id), order.time_s)?;
            }
            for gate in &ship.arrival_gate {
                self.validate_time(&format!("ship {} arrival gate", ship.id), gate.time_s)?;
            }
        }

        if let Some(camera) = &self.camera {
            let tuning = &camera.tuning;
            if tuning.min_zoom <= 0.0 || tuning.max_zoom_out < tuning.min_zoom {
                return Err(validation("camera zoom range must satisfy 0 < min_zoom <= max_zoom_out"));
            }
            for rate in [
                tuning.move_accel,
                tuning.move_decel,
                tuning.rotation_accel,
                tuning.rotation_decel,
                tuning.zoom_accel,
                tuning.zoom_decel,
            ] {
                if rate <= 0.0 {
                    return Err(validation("camera acceleration and deceleration rates must be positive"));
                }
            }
            for input in &camera.inputs {
                self.validate_time("camera input", input.time_s)?;
            }
        }

        if let Some(selection) = &self.selection {
            for member in &selection.members {
                if !ship_ids.contains(member.as_str()) {
                    return Err(validation(format!("selection member {} is not a ship", member)));
                }
            }
            for change in &selection.changes {
                self.validate_time("selection change", change.time_s)?;
                match &change.change {
                    SelectionChange::Select { id } | SelectionChange::Deselect { id } => {
                        if !ship_ids.contains(id.as_str()) {
                            return Err(validation(format!("selection change refers to unknown ship {}", id)));
                        }
                    }
                    SelectionChange::SetOrderBeacon { .. } => {}
                }
            }
        }

        Ok(())
    }

    fn validate_ship_tuning(&self, id: &str, tuning: &ShipTuning) -> Result<(), ScenarioError> {
        if tuning.travel_speed <= 0.0 {
            return Err(validation(format!("ship {} travel_speed must be positive", id)));
        }
        if tuning.travel_accel <= 0.0 || tuning.travel_decel <= 0.0 {
            return Err(validation(format!("ship {} acceleration and deceleration must be positive", id)));
        }
        if tuning.arrival_epsilon < 0.0 {
            return Err(validation(format!("ship {} arrival_epsilon must not be negative", id)));
        }
        if !(0.0..=1.0).contains(&tuning.decel_onset_fraction) {
            return Err(validation(format!("ship {} decel_onset_fraction must be within [0, 1]", id)));
        }
        Ok(())
    }

    fn validate_time(&self, what: &str, time_s: f64) -> Result<(), ScenarioError> {
        if time_s < 0.0 || time_s >= self.sim.t_max_s {
            return Err(validation(format!(
                "{} time {} outside [0, {})",
                what, time_s, self.sim.t_max_s
            )));
        }
        Ok(())
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("固定時間刻み: {:.3}秒", self.sim.fixed_dt_s);
        println!("フレーム時間刻み: {:.3}秒", self.sim.frame_dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        println!();

        println!("=== 艦 ===");
        println!("艦数: {}", self.ships.len());
        for ship in &self.ships {
            println!(
                "  {}: 初期位置 ({:.1}, {:.1}, {:.1}), 指示 {}件",
                ship.id,
                ship.position.x,
                ship.position.y,
                ship.position.z,
                ship.orders.len()
            );
        }
        println!();

        match &self.camera {
            Some(camera) => println!("カメラ: {} (入力 {}件)", camera.id, camera.inputs.len()),
            None => println!("カメラ: なし"),
        }
        match &self.selection {
            Some(selection) => println!(
                "選択グループ: {} ({}隻)",
                selection.id,
                selection.members.len()
            ),
            None => println!("選択グループ: なし"),
        }
    }
}

fn validation(msg: impl Into<String>) -> ScenarioError {
    ScenarioError::ValidationError(msg.into())
}

/// シナリオ読み込みエラー
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    ParseError(PathBuf, #[source] serde_yaml::Error),
    #[error("設定検証エラー: {0}")]
    ValidationError(String),
}
