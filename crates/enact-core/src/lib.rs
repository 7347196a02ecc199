//! enact-core
//!
//! Core building blocks for the Enact dispatcher: accept a task, deliver it to a
//! remote worker over HTTP, retry transient failures with backoff, and record
//! exactly one terminal status per task.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, outcome, decision, retry policy, status, errors）
//! - **ports**: 抽象化レイヤー（DeliveryClient, StatusStore, Decider, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, dispatcher, worker pool）
//! - **impls**: 実装（HttpDeliveryClient, InMemoryStatusStore, FileStatusStore）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
