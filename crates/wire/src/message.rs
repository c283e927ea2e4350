// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::time::Duration;

use rmake_core::{BuilderId, BuilderRequest, File, Job, SessionToken, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

/// Every message exchanged between clients, the manager and builders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Builder → Manager: opens the handshake
    BuilderAnnouncement(BuilderAnnouncement),
    /// Manager → Builder: closes the handshake
    ManagerAcknowledge(ManagerAcknowledge),
    /// Client → Manager: build submission
    ManagerRequest(ManagerRequest),
    /// Manager → Builder, Builder → Builder: dispatched work
    BuilderRequest(BuilderRequest),
    /// Builder → Builder, Builder → Manager: artifact delivery
    RequiredFileMessage(RequiredFileMessage),
    /// Builder → Manager: terminal artifacts for a session
    BuilderResult(BuilderResult),
    /// Builder → Manager: per-job status, always sent
    JobFinishedMessage(JobFinishedMessage),
    /// Builder → Manager: periodic load report
    BuilderStatusUpdate(BuilderStatusUpdate),
    /// Manager → Client: terminal response
    FinalBuildResult(FinalBuildResult),
    /// Manager → Client: progress feedback
    BuildStatus(BuildStatus),
}

impl Message {
    /// Variant name, for logs and protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::BuilderAnnouncement(_) => "BuilderAnnouncement",
            Message::ManagerAcknowledge(_) => "ManagerAcknowledge",
            Message::ManagerRequest(_) => "ManagerRequest",
            Message::BuilderRequest(_) => "BuilderRequest",
            Message::RequiredFileMessage(_) => "RequiredFileMessage",
            Message::BuilderResult(_) => "BuilderResult",
            Message::JobFinishedMessage(_) => "JobFinishedMessage",
            Message::BuilderStatusUpdate(_) => "BuilderStatusUpdate",
            Message::FinalBuildResult(_) => "FinalBuildResult",
            Message::BuildStatus(_) => "BuildStatus",
        }
    }

    /// Session the message belongs to, if it is session scoped.
    pub fn session(&self) -> Option<&SessionToken> {
        match self {
            Message::BuilderRequest(m) => Some(&m.session),
            Message::RequiredFileMessage(m) => Some(&m.session),
            Message::BuilderResult(m) => Some(&m.session),
            Message::JobFinishedMessage(m) => Some(&m.session),
            Message::FinalBuildResult(m) => Some(&m.session),
            Message::BuildStatus(m) => Some(&m.session),
            Message::BuilderAnnouncement(_)
            | Message::ManagerAcknowledge(_)
            | Message::ManagerRequest(_)
            | Message::BuilderStatusUpdate(_) => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Message {
                fn from(m: $ty) -> Self {
                    Message::$ty(m)
                }
            }
        )+
    };
}

impl_from!(
    BuilderAnnouncement,
    ManagerAcknowledge,
    ManagerRequest,
    BuilderRequest,
    RequiredFileMessage,
    BuilderResult,
    JobFinishedMessage,
    BuilderStatusUpdate,
    FinalBuildResult,
    BuildStatus,
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderAnnouncement {
    pub hostname: String,
    /// Address peers and the manager use to reach this builder
    pub listener_addr: String,
    pub protocol_version: u32,
}

impl BuilderAnnouncement {
    pub fn new(hostname: impl Into<String>, listener_addr: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            listener_addr: listener_addr.into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerAcknowledge {
    /// Assigned identity; absent when the handshake was rejected
    pub uuid: Option<BuilderId>,
    pub protocol_version: u32,
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl ManagerAcknowledge {
    pub fn accepted(uuid: BuilderId) -> Self {
        Self {
            uuid: Some(uuid),
            protocol_version: PROTOCOL_VERSION,
            success: true,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            uuid: None,
            protocol_version: PROTOCOL_VERSION,
            success: false,
            message: message.into(),
        }
    }
}

/// A build submission: the job graph, the requested artifact and the
/// source files the client ships with it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManagerRequest {
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub os: String,
    /// Path of the artifact the build must produce
    pub output: String,
    #[serde(default)]
    pub files: HashMap<String, File>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredFileMessage {
    /// `None` when the sender could not load the artifact
    pub payload: Option<File>,
    pub session: SessionToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderResult {
    #[serde(default)]
    pub results: Vec<File>,
    pub session: SessionToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFinishedMessage {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub error: String,
    pub success: bool,
    pub session: SessionToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderStatusUpdate {
    pub queued_jobs: usize,
    #[serde(default)]
    pub running_jobs: usize,
    pub cpu_load: f32,
    pub mem_use: f32,
}

impl BuilderStatusUpdate {
    /// Load figure the manager orders builders by.
    pub fn load(&self) -> usize {
        self.queued_jobs + self.running_jobs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalBuildResult {
    pub session: SessionToken,
    pub success: bool,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub results: Vec<File>,
    /// Wall time from submission to completion
    pub build_time: Duration,
}

impl FinalBuildResult {
    /// A failed result for a build that never got dispatched.
    pub fn failure(session: SessionToken, error: impl Into<String>) -> Self {
        Self {
            session,
            success: false,
            error: error.into(),
            stdout: String::new(),
            results: Vec::new(),
            build_time: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStatus {
    pub message: String,
    pub percent_complete: f32,
    pub session: SessionToken,
}
