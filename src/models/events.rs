//! 到着通知イベント
//!
//! 船の到着状態の遷移（目標割り当て → 到着）を型付きで表現し、
//! シミュレーション全体の記録として保存できるようにします。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 到着状態の遷移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrivalTransition {
    /// 新しい目標が割り当てられた（到着していない状態へ）
    Assigned,
    /// 目標に完全に到着した
    Arrived,
}

impl ArrivalTransition {
    /// 遷移後の到着フラグ
    pub fn arrived(&self) -> bool {
        matches!(self, ArrivalTransition::Arrived)
    }
}

/// 到着通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalEvent {
    pub ship_id: String,
    /// 目標割り当ての通し番号（1始まり）
    pub order: u32,
    pub transition: ArrivalTransition,
}

/// 到着状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrivalState {
    /// 目標未割り当て
    Unassigned,
    /// 移動中
    Travelling,
    /// 到着済み
    Arrived,
}

/// 遷移ごとに一度だけ通知を発行する通知器
#[derive(Debug, Clone)]
pub struct ArrivalNotifier {
    ship_id: String,
    order: u32,
    state: ArrivalState,
    pending: Vec<ArrivalEvent>,
}

impl ArrivalNotifier {
    pub fn new(ship_id: String) -> Self {
        Self {
            ship_id,
            order: 0,
            state: ArrivalState::Unassigned,
            pending: Vec::new(),
        }
    }

    /// 新しい目標の割り当て（常に通知）
    pub fn assign(&mut self) -> &ArrivalEvent {
        self.order += 1;
        self.state = ArrivalState::Travelling;
        self.push(ArrivalTransition::Assigned)
    }

    /// 到着の通知
    ///
    /// 同じ割り当てに対しては一度しか通知しません。通知した場合は`true`を返します。
    pub fn arrive(&mut self) -> bool {
        if self.state != ArrivalState::Travelling {
            return false;
        }
        self.state = ArrivalState::Arrived;
        self.push(ArrivalTransition::Arrived);
        true
    }

    pub fn state(&self) -> ArrivalState {
        self.state
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    /// 未処理の通知を取り出す
    pub fn drain(&mut self) -> Vec<ArrivalEvent> {
        std::mem::take(&mut self.pending)
    }

    fn push(&mut self, transition: ArrivalTransition) -> &ArrivalEvent {
        self.pending.push(ArrivalEvent {
            ship_id: self.ship_id.clone(),
            order: self.order,
            transition,
        });
        &self.pending[self.pending.len() - 1]
    }
}

/// 時刻付きの記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub time_s: f64,
    #[serde(flatten)]
    pub event: ArrivalEvent,
}

/// シミュレーション中の到着通知を記録
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Vec<RecordedEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, time_s: f64, event: ArrivalEvent) {
        self.events.push(RecordedEvent { time_s, event });
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    /// 指定した船の記録のみ
    pub fn events_for<'a>(&'a self, ship_id: &'a str) -> impl Iterator<Item = &'a RecordedEvent> + 'a {
        self.events.iter().filter(move |e| e.event.ship_id == ship_id)
    }

    pub fn arrival_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.event.transition.arrived())
            .count()
    }

    /// YAMLファイルに保存
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), EventLogError> {
        let yaml = serde_yaml::to_string(&self.events)?;
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, yaml)?;
        Ok(())
    }

    /// YAMLファイルから読み込み
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, EventLogError> {
        let yaml = fs::read_to_string(path)?;
        let events: Vec<RecordedEvent> = serde_yaml::from_str(&yaml)?;
        Ok(Self { events })
    }
}

/// イベントログの入出力エラー
#[derive(Debug, thiserror::Error)]
pub enum EventLogError {
    #[error("イベントログの入出力エラー: {0}")]
    Io(#[from] std::io::Error),
    #[error("イベントログのYAML変換エラー: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
