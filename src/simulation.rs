//! # Simulation モジュール
//!
//! 艦・カメラ・選択グループを協調動作させるシミュレーションエンジンを提供します。
//!
//! 艦の移動は固定時間刻み（`fixed_dt_s`）、カメラと選択グループの更新は
//! フレーム時間刻み（`frame_dt_s`）で進行する2レートのループです。
//! シナリオに記述された時刻付きイベント（目標指示、到着許可、カメラ入力、
//! 選択変更）はフレームの先頭で適用されます。
//!
//! ## フレームの処理順序
//!
//! 1. **イベント適用**: フレーム時刻までに予定されたイベントを時刻順に適用
//! 2. **艦の処理**: フレーム時刻まで固定刻みで全艦を進め、到着通知を記録
//! 3. **選択グループ処理**: 選択中の艦の位置から原点を再計算
//! 4. **カメラ処理**: グループ原点を渡してからフレーム刻みで更新
//!
//! ## 使用例
//!
//! ```no_run
//! use rtsmotion::scenario::ScenarioConfig;
//! use rtsmotion::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/demo.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! let summary = engine.run()?;
//! summary.print();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;

use glam::DVec3;
use tracing::{debug, info, trace};

use crate::models::*;
use crate::scenario::*;

/// 時刻比較の許容誤差
const TIME_EPSILON: f64 = 1e-9;

/// 予定されたイベントの内容
#[derive(Debug, Clone)]
enum ScheduledAction {
    Order { ship: usize, beacon: Option<Beacon> },
    Gate { ship: usize, allowed: bool },
    Camera(CameraInput),
    Selection(SelectionChange),
}

#[derive(Debug, Clone)]
struct ScheduledEvent {
    time_s: f64,
    action: ScheduledAction,
}

/// 艦ごとの実行結果
#[derive(Debug, Clone)]
pub struct ShipSummary {
    pub id: String,
    pub position: DVec3,
    pub phase: ShipPhase,
    pub arrivals: usize,
}

/// シミュレーション実行結果
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    pub elapsed_s: f64,
    pub frame_count: u64,
    pub fixed_step_count: u64,
    pub arrivals: usize,
    /// 全艦到着により早期終了したか
    pub stopped_idle: bool,
    pub ships: Vec<ShipSummary>,
    pub camera_position: Option<DVec3>,
    pub group_origin: Option<DVec3>,
}

impl SimulationSummary {
    /// 実行結果を表示
    pub fn print(&self) {
        println!("=== 実行結果 ===");
        println!("経過時間: {:.2}秒", self.elapsed_s);
        println!("フレーム数: {}", self.frame_count);
        println!("固定ステップ数: {}", self.fixed_step_count);
        println!("到着通知: {}件", self.arrivals);
        if self.stopped_idle {
            println!("全艦の到着により終了しました");
        }
        for ship in &self.ships {
            println!(
                "  {}: 位置 ({:.2}, {:.2}, {:.2}), 状態 {:?}, 到着 {}回",
                ship.id, ship.position.x, ship.position.y, ship.position.z, ship.phase, ship.arrivals
            );
        }
        if let Some(p) = self.camera_position {
            println!("カメラ位置: ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
        }
        if let Some(p) = self.group_origin {
            println!("グループ原点: ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
        }
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub fixed_dt: f64,
    pub frame_dt: f64,
    pub max_time: f64,
    pub frame_count: u64,
    pub fixed_step_count: u64,

    pub ships: Vec<LightShip>,
    pub camera: Option<RtsCameraRig>,
    pub selection: Option<SelectionGroup>,
    pub recorder: EventRecorder,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,

    ship_index: HashMap<String, usize>,
    selected: BTreeSet<String>,
    schedule: VecDeque<ScheduledEvent>,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        Self {
            current_time: 0.0,
            fixed_dt: scenario.sim.fixed_dt_s,
            frame_dt: scenario.sim.frame_dt_s,
            max_time: scenario.sim.t_max_s,
            frame_count: 0,
            fixed_step_count: 0,
            ships: Vec::new(),
            camera: None,
            selection: None,
            recorder: EventRecorder::new(),
            scenario_config: scenario,
            verbose_level,
            ship_index: HashMap::new(),
            selected: BTreeSet::new(),
            schedule: VecDeque::new(),
        }
    }

    pub fn initialize(&mut self) -> Result<(), SimulationError> {
        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }
        self.scenario_config.validate()?;

        self.initialize_ships();
        self.initialize_camera();
        self.initialize_selection()?;
        self.build_schedule()?;

        if self.verbose_level > 0 {
            info!("初期化完了:");
            info!("  艦: {}隻", self.ships.len());
            info!("  カメラ: {}", if self.camera.is_some() { "あり" } else { "なし" });
            info!("  選択中: {}隻", self.selected.len());
            info!("  予定イベント: {}件", self.schedule.len());
        }
        Ok(())
    }

    fn initialize_ships(&mut self) {
        self.ships.clear();
        self.ship_index.clear();
        for ship_config in &self.scenario_config.ships {
            let transform = Transform::from_heading(ship_config.position, ship_config.heading_deg);
            let ship = LightShip::with_tuning(ship_config.id.clone(), transform, ship_config.tuning);
            if self.verbose_level > 1 {
                debug!(
                    "艦初期化: {} (位置: {:.1}, {:.1}, {:.1})",
                    ship.id, ship_config.position.x, ship_config.position.y, ship_config.position.z
                );
            }
            self.ship_index.insert(ship.id.clone(), self.ships.len());
            self.ships.push(ship);
        }
    }

    fn initialize_camera(&mut self) {
        self.camera = self.scenario_config.camera.as_ref().map(|camera_config| {
            let transform = Transform::from_heading(camera_config.position, camera_config.heading_deg);
            RtsCameraRig::new(camera_config.id.clone(), transform, camera_config.tuning)
        });
    }

    fn initialize_selection(&mut self) -> Result<(), SimulationError> {
        self.selected.clear();
        let Some(selection_config) = &self.scenario_config.selection else {
            self.selection = None;
            return Ok(());
        };

        let mut group = SelectionGroup::new(selection_config.id.clone());
        group.set_order_beacon(selection_config.order_beacon);
        for member in &selection_config.members {
            if !self.ship_index.contains_key(member) {
                return Err(SimulationError::UnknownShip(member.clone()));
            }
            self.selected.insert(member.clone());
        }
        self.selection = Some(group);
        self.update_selection();
        Ok(())
    }

    fn build_schedule(&mut self) -> Result<(), SimulationError> {
        let mut events = Vec::new();

        for ship_config in &self.scenario_config.ships {
            let ship = self.lookup_ship(&ship_config.id)?;
            for order in &ship_config.orders {
                events.push(ScheduledEvent {
                    time_s: order.time_s,
                    action: ScheduledAction::Order {
                        ship,
                        beacon: order.beacon.map(|b| Beacon::new(b.position, b.heading_deg)),
                    },
                });
            }
            for gate in &ship_config.arrival_gate {
                events.push(ScheduledEvent {
                    time_s: gate.time_s,
                    action: ScheduledAction::Gate {
                        ship,
                        allowed: gate.allowed,
                    },
                });
            }
        }

        if let Some(camera_config) = &self.scenario_config.camera {
            events.extend(camera_config.inputs.iter().map(|input| ScheduledEvent {
                time_s: input.time_s,
                action: ScheduledAction::Camera(input.input.clone()),
            }));
        }

        if let Some(selection_config) = &self.scenario_config.selection {
            events.extend(selection_config.changes.iter().map(|change| ScheduledEvent {
                time_s: change.time_s,
                action: ScheduledAction::Selection(change.change.clone()),
            }));
        }

        // 同時刻のイベントは記述順を保つ（安定ソート）
        events.sort_by(|a, b| a.time_s.total_cmp(&b.time_s));
        self.schedule = events.into();
        Ok(())
    }

    fn lookup_ship(&self, id: &str) -> Result<usize, SimulationError> {
        self.ship_index
            .get(id)
            .copied()
            .ok_or_else(|| SimulationError::UnknownShip(id.to_string()))
    }

    pub fn run(&mut self) -> Result<SimulationSummary, SimulationError> {
        info!("=== シミュレーション実行開始 ===");
        let stop_when_idle = self.scenario_config.sim.stop_when_idle;
        let mut stopped_idle = false;

        while self.current_time + TIME_EPSILON < self.max_time {
            self.step_frame()?;

            if self.verbose_level > 2 {
                trace!("時刻: {:.3}秒 (フレーム: {})", self.current_time, self.frame_count);
            }

            if self.frame_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!("進行状況: {:.1}% ({:.1}/{:.1}秒)", progress, self.current_time, self.max_time);
            }

            if stop_when_idle && self.is_idle() {
                info!("全艦が到着し予定イベントもないため終了します");
                stopped_idle = true;
                break;
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.2}秒", self.current_time);
        info!("総フレーム数: {} (固定ステップ: {})", self.frame_count, self.fixed_step_count);
        info!("到着通知: {}件", self.recorder.arrival_count());

        Ok(self.summary(stopped_idle))
    }

    /// 1フレーム分進める
    pub fn step_frame(&mut self) -> Result<(), SimulationError> {
        self.apply_due_events()?;

        let frame_end = (self.frame_count + 1) as f64 * self.frame_dt;
        while (self.fixed_step_count + 1) as f64 * self.fixed_dt <= frame_end + TIME_EPSILON {
            self.fixed_step();
        }

        self.frame_count += 1;
        self.current_time = frame_end;

        self.update_selection();
        self.process_camera();
        Ok(())
    }

    /// 予定イベントが残っておらず、目標を持つ全艦が到着済み
    pub fn is_idle(&self) -> bool {
        self.schedule.is_empty()
            && self
                .ships
                .iter()
                .all(|ship| ship.target_position().is_none() || ship.has_arrived())
    }

    pub fn ship(&self, id: &str) -> Option<&LightShip> {
        self.ship_index.get(id).map(|&i| &self.ships[i])
    }

    pub fn pending_events(&self) -> usize {
        self.schedule.len()
    }

    /// 到着通知の記録をYAMLで保存
    pub fn save_events<P: AsRef<Path>>(&self, path: P) -> Result<(), SimulationError> {
        self.recorder.save_to_file(&path)?;
        info!("到着通知を保存しました: {}", path.as_ref().display());
        Ok(())
    }

    fn apply_due_events(&mut self) -> Result<(), SimulationError> {
        while self
            .schedule
            .front()
            .is_some_and(|event| event.time_s <= self.current_time + TIME_EPSILON)
        {
            if let Some(event) = self.schedule.pop_front() {
                self.apply_event(event.action)?;
            }
        }
        self.collect_ship_events(self.current_time);
        Ok(())
    }

    fn apply_event(&mut self, action: ScheduledAction) -> Result<(), SimulationError> {
        match action {
            ScheduledAction::Order { ship, beacon } => {
                let ship = &mut self.ships[ship];
                match beacon {
                    Some(beacon) => ship.set_target(beacon),
                    None => ship.remove_target(),
                }
            }
            ScheduledAction::Gate { ship, allowed } => {
                self.ships[ship].set_allowed_to_arrive(allowed);
            }
            ScheduledAction::Camera(input) => self.apply_camera_input(input),
            ScheduledAction::Selection(change) => self.apply_selection_change(change)?,
        }
        Ok(())
    }

    fn apply_camera_input(&mut self, input: CameraInput) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        debug!("カメラ入力 ({:.3}秒): {:?}", self.current_time, input);
        match input {
            CameraInput::MoveHorizontal { value } => camera.input_move_horizontal(value),
            CameraInput::MoveVertical { value } => camera.input_move_vertical(value),
            CameraInput::Rotate { value } => camera.input_rotation(value),
            CameraInput::RotationToggle { pressed } => camera.input_rotation_toggle(pressed),
            CameraInput::Zoom { value } => camera.input_zoom(value),
            CameraInput::AttachToGroup => camera.input_attach_to_group(),
        }
    }

    fn apply_selection_change(&mut self, change: SelectionChange) -> Result<(), SimulationError> {
        match change {
            SelectionChange::Select { id } => {
                self.lookup_ship(&id)?;
                debug!("選択に追加: {}", id);
                self.selected.insert(id);
            }
            SelectionChange::Deselect { id } => {
                self.lookup_ship(&id)?;
                debug!("選択から除外: {}", id);
                self.selected.remove(&id);
            }
            SelectionChange::SetOrderBeacon { position } => {
                if let Some(group) = self.selection.as_mut() {
                    debug!("命令ビーコン変更: {:?}", position);
                    group.set_order_beacon(position);
                }
            }
        }
        Ok(())
    }

    fn fixed_step(&mut self) {
        for ship in &mut self.ships {
            ship.tick(self.fixed_dt);
        }
        self.fixed_step_count += 1;
        self.collect_ship_events(self.fixed_step_count as f64 * self.fixed_dt);
    }

    fn collect_ship_events(&mut self, time_s: f64) {
        for ship in &mut self.ships {
            for event in ship.take_events() {
                self.recorder.record(time_s, event);
            }
        }
    }

    fn update_selection(&mut self) {
        let Some(group) = self.selection.as_mut() else {
            return;
        };
        let members: BTreeMap<String, DVec3> = self
            .ships
            .iter()
            .filter(|ship| self.selected.contains(&ship.id))
            .map(|ship| (ship.id.clone(), ship.get_position()))
            .collect();
        group.update(members);
    }

    fn process_camera(&mut self) {
        let Some(camera) = self.camera.as_mut() else {
            return;
        };
        match &self.selection {
            Some(group) => camera.set_group_anchor(group.origin(), group.len()),
            None => camera.set_group_anchor(None, 0),
        }
        camera.tick(self.frame_dt);
    }

    fn summary(&self, stopped_idle: bool) -> SimulationSummary {
        let ships = self
            .ships
            .iter()
            .map(|ship| ShipSummary {
                id: ship.id.clone(),
                position: ship.get_position(),
                phase: ship.phase(),
                arrivals: self
                    .recorder
                    .events_for(&ship.id)
                    .filter(|e| e.event.transition.arrived())
                    .count(),
            })
            .collect();

        SimulationSummary {
            elapsed_s: self.current_time,
            frame_count: self.frame_count,
            fixed_step_count: self.fixed_step_count,
            arrivals: self.recorder.arrival_count(),
            stopped_idle,
            ships,
            camera_position: self.camera.as_ref().map(|c| c.camera_position()),
            group_origin: self.selection.as_ref().and_then(|g| g.origin()),
        }
    }
}

/// シミュレーション実行時のエラー
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error("未定義の艦が参照されました: {0}")]
    UnknownShip(String),
    #[error(transparent)]
    EventLog(#[from] EventLogError),
}
