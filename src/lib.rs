//! # rtsmotion
//!
//! RTS向けの移動ライブラリです。加減速ランプによる速度制御、目標ビーコンへ
//! 移動する軽量艦、パン・回転・ズームのカメラリグ、選択グループの重心追跡と、
//! それらを2レートで進めるシナリオ駆動のシミュレーションエンジンを提供します。

pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
