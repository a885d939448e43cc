//! Session flow: which screen is active and what a restart clears.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::composition::{self, Composition, SharedComposition};
use crate::config::{Configuration, ShareOptions};
use crate::error::Result;
use crate::events::ExportProgress;
use crate::qr;
use crate::render::text::FontSource;
use crate::tasks::capture::{CapturePipeline, ExportArtifact};
use crate::tasks::loader::Photo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intro,
    Upload,
    Frame,
    Magic,
    Export,
}

impl Phase {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Intro => Some(Self::Upload),
            Self::Upload => Some(Self::Frame),
            Self::Frame => Some(Self::Magic),
            Self::Magic => Some(Self::Export),
            Self::Export => None,
        }
    }

    /// Phases past upload show the frame and need a photo.
    pub fn needs_photo(self) -> bool {
        matches!(self, Self::Frame | Self::Magic | Self::Export)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
}

/// Export result plus the optional share code.
#[derive(Debug, Clone)]
pub struct SessionExport {
    pub artifact: ExportArtifact,
    pub share_code: Option<String>,
}

pub struct Session {
    phase: Phase,
    composition: SharedComposition,
    pipeline: CapturePipeline,
    share: ShareOptions,
}

impl Session {
    pub fn new(cfg: &Configuration, fonts: Arc<dyn FontSource>) -> Self {
        Self {
            phase: Phase::Intro,
            composition: Composition::from_config(cfg).into_shared(),
            pipeline: CapturePipeline::new(cfg.export.clone(), fonts),
            share: cfg.share.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn composition(&self) -> &SharedComposition {
        &self.composition
    }

    pub fn pipeline(&self) -> &CapturePipeline {
        &self.pipeline
    }

    /// Moves to the next phase. Screens that show the frame are not entered
    /// without a photo.
    pub fn advance(&mut self) -> Option<PhaseChange> {
        let to = self.phase.next()?;
        self.go_to(to)
    }

    pub fn go_to(&mut self, to: Phase) -> Option<PhaseChange> {
        if to.needs_photo() && composition::lock(&self.composition).photo().is_none() {
            debug!(?to, "phase needs a photo first");
            return None;
        }
        self.goto(to)
    }

    /// Mounts the photo and jumps straight to the frame editor.
    pub fn accept_photo(&mut self, photo: Photo) -> Option<PhaseChange> {
        if !composition::lock(&self.composition).mount_photo(photo) {
            return None;
        }
        self.goto(Phase::Frame)
    }

    /// Back to the intro with a blank composition. Refused while an export
    /// is capturing the composition.
    pub fn restart(&mut self) -> Option<PhaseChange> {
        if self.pipeline.is_busy() || !composition::lock(&self.composition).restart() {
            debug!("restart refused while exporting");
            return None;
        }
        info!("session restarted");
        self.goto(Phase::Intro)
    }

    /// Exports the composition and, best effort, a share code for it.
    pub async fn export(
        &self,
        progress: Option<&mpsc::Sender<ExportProgress>>,
    ) -> Result<SessionExport> {
        let artifact = self.pipeline.export(&self.composition, progress).await?;
        let share_code = qr::share_payload(&artifact, &self.share)
            .and_then(|payload| qr::share_code(&payload, self.share.min_dimension));
        Ok(SessionExport {
            artifact,
            share_code,
        })
    }

    fn goto(&mut self, to: Phase) -> Option<PhaseChange> {
        if self.phase == to {
            return None;
        }
        let change = PhaseChange {
            from: self.phase,
            to,
        };
        debug!(from = ?change.from, to = ?change.to, "phase change");
        self.phase = to;
        Some(change)
    }
}
