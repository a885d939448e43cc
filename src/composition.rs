//! The live frame composition: a retained scene with typed slots.
//!
//! The header, photo viewport, annotation and footer are explicit fields;
//! nothing is routed by inspecting children. The composition owns the
//! [`TransformEngine`] and feeds it fresh geometry after every layout change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use tracing::debug;

use crate::config::{Configuration, FrameDesign, OverlayToggles, PAPER};
use crate::error::{Error, Result};
use crate::events::PointerEvent;
use crate::gesture::{GestureAction, GestureTracker};
use crate::processing::color::HexColor;
use crate::processing::layout::{FrameLayout, Offset, Rect, Size, annotation_rows, fit_within};
use crate::tasks::loader::Photo;
use crate::transform::{BoundRectangle, FontStyle, FrameSettings, TransformEngine, TransformLimits, compute_bounds};

/// Composition shared between the input path and the capture pipeline.
/// The lock is never held across an `.await`.
pub type SharedComposition = Arc<Mutex<Composition>>;

pub fn lock(composition: &SharedComposition) -> MutexGuard<'_, Composition> {
    composition.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    ResetTransform,
    FontToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub kind: ControlKind,
    pub visible: bool,
    /// Must never appear in an exported bitmap.
    pub export_excluded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayKind {
    FilmGrain,
    WarmTone,
    LightLeak,
}

#[derive(Debug)]
pub struct Composition {
    design: FrameDesign,
    layout: FrameLayout,
    photo: Option<Photo>,
    engine: TransformEngine,
    overlays: OverlayToggles,
    default_overlays: OverlayToggles,
    controls: Vec<Control>,
    input_locked: bool,
    gestures: GestureTracker,
}

impl Composition {
    pub fn new(design: FrameDesign, limits: TransformLimits, overlays: OverlayToggles) -> Self {
        let layout = FrameLayout::compute(
            design.size,
            design.padding,
            annotation_rows(""),
            design.footer_lines.len(),
        );
        Self {
            design,
            layout,
            photo: None,
            engine: TransformEngine::new(limits),
            overlays,
            default_overlays: overlays,
            controls: vec![
                Control {
                    kind: ControlKind::ResetTransform,
                    visible: true,
                    export_excluded: true,
                },
                Control {
                    kind: ControlKind::FontToggle,
                    visible: true,
                    export_excluded: true,
                },
            ],
            input_locked: false,
            gestures: GestureTracker::new(),
        }
    }

    pub fn from_config(cfg: &Configuration) -> Self {
        Self::new(cfg.frame.clone(), cfg.transform, cfg.overlays)
    }

    pub fn into_shared(self) -> SharedComposition {
        Arc::new(Mutex::new(self))
    }

    pub fn design(&self) -> &FrameDesign {
        &self.design
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.photo.as_ref()
    }

    pub fn settings(&self) -> &FrameSettings {
        self.engine.settings()
    }

    pub fn bounds(&self) -> BoundRectangle {
        self.engine.bounds()
    }

    pub fn overlays(&self) -> OverlayToggles {
        self.overlays
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn control(&self, kind: ControlKind) -> Option<&Control> {
        self.controls.iter().find(|c| c.kind == kind)
    }

    pub fn is_input_locked(&self) -> bool {
        self.input_locked
    }

    /// Displayed photo size at scale 1: natural size shrunk to fit the viewport.
    pub fn content_size(&self) -> Size {
        self.photo
            .as_ref()
            .map(|p| fit_within(p.natural_size(), self.layout.viewport.size()))
            .unwrap_or_default()
    }

    /// Accepts a freshly decoded photo. Settings go back to defaults and the
    /// one-time auto-fit is armed.
    pub fn mount_photo(&mut self, photo: Photo) -> bool {
        if self.rejects_input("mount_photo") {
            return false;
        }
        debug!(label = %photo.label, "mounting photo");
        self.engine.begin_photo();
        self.photo = Some(photo);
        self.relayout();
        true
    }

    pub fn unmount_photo(&mut self) -> bool {
        if self.rejects_input("unmount_photo") {
            return false;
        }
        self.photo = None;
        self.engine.clear();
        self.gestures.handle(PointerEvent::Cancel, 1.0);
        self.relayout();
        true
    }

    /// New logical frame size, e.g. after a window resize. Refused while an
    /// export is capturing the current layout.
    pub fn resize(&mut self, size: Size) -> bool {
        if self.rejects_input("resize") {
            return false;
        }
        self.design.size = size;
        self.relayout();
        true
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> bool {
        let scale = self.engine.settings().photo_scale();
        let action = self.gestures.handle(event, scale);
        let Some(action) = action else {
            return false;
        };
        if self.rejects_input("gesture") {
            return false;
        }
        match action {
            GestureAction::Pan(delta) => {
                self.engine.pan(delta);
            }
            GestureAction::Pinch {
                initial_scale,
                initial_distance,
                current_distance,
            } => {
                self.engine
                    .pinch(initial_scale, initial_distance, current_distance);
            }
        }
        true
    }

    pub fn pan(&mut self, delta: Offset) -> bool {
        if self.rejects_input("pan") {
            return false;
        }
        self.engine.pan(delta);
        true
    }

    pub fn set_scale(&mut self, scale: f32) -> bool {
        if self.rejects_input("set_scale") {
            return false;
        }
        self.engine.set_scale(scale);
        true
    }

    pub fn reset_transform(&mut self) -> bool {
        if self.rejects_input("reset_transform") {
            return false;
        }
        self.engine.reset();
        true
    }

    /// Replaces the annotation. The row count drives the layout, so the
    /// viewport and bounds are recomputed.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        if self.rejects_input("set_text") {
            return false;
        }
        self.engine.set_text(text);
        self.relayout();
        true
    }

    pub fn set_font_style(&mut self, style: FontStyle) -> bool {
        if self.rejects_input("set_font_style") {
            return false;
        }
        self.engine.set_font_style(style);
        true
    }

    pub fn toggle_font(&mut self) -> bool {
        if self.rejects_input("toggle_font") {
            return false;
        }
        self.engine.toggle_font();
        true
    }

    pub fn set_overlay(&mut self, kind: OverlayKind, on: bool) -> bool {
        if self.rejects_input("set_overlay") {
            return false;
        }
        match kind {
            OverlayKind::FilmGrain => self.overlays.film_grain = on,
            OverlayKind::WarmTone => self.overlays.warm_tone = on,
            OverlayKind::LightLeak => self.overlays.light_leak = on,
        }
        true
    }

    pub fn toggle_overlay(&mut self, kind: OverlayKind) -> bool {
        let on = match kind {
            OverlayKind::FilmGrain => !self.overlays.film_grain,
            OverlayKind::WarmTone => !self.overlays.warm_tone,
            OverlayKind::LightLeak => !self.overlays.light_leak,
        };
        self.set_overlay(kind, on)
    }

    /// Activates an on-frame control. Hidden controls cannot be pressed.
    pub fn press_control(&mut self, kind: ControlKind) -> bool {
        if !self.control(kind).is_some_and(|c| c.visible) {
            return false;
        }
        match kind {
            ControlKind::ResetTransform => self.reset_transform(),
            ControlKind::FontToggle => self.toggle_font(),
        }
    }

    /// Session restart: no photo, default settings and overlays. Refused
    /// while an export is in flight.
    pub fn restart(&mut self) -> bool {
        if self.rejects_input("restart") {
            return false;
        }
        self.photo = None;
        self.engine.clear();
        self.overlays = self.default_overlays;
        self.gestures.handle(PointerEvent::Cancel, 1.0);
        for control in &mut self.controls {
            control.visible = true;
        }
        self.relayout();
        true
    }

    /// Fails when there is nothing sensible to capture.
    pub fn check_exportable(&self) -> Result<()> {
        if self.photo.is_none() {
            return Err(Error::ExportPrecondition("no photo is mounted".into()));
        }
        if !self.layout.frame.size().is_measurable() || !self.layout.viewport.size().is_measurable() {
            return Err(Error::ExportPrecondition(
                "frame has no rendered size".into(),
            ));
        }
        if !self.engine.has_geometry() {
            return Err(Error::ExportPrecondition(
                "photo geometry has not been measured".into(),
            ));
        }
        Ok(())
    }

    /// Locks input and hides every export-excluded control that is visible.
    /// Returns what was hidden so [`Self::end_export`] restores exactly that.
    /// Fails with [`Error::ExportInProgress`] while another capture holds the
    /// lock, whichever pipeline started it.
    pub fn begin_export(&mut self) -> Result<Vec<ControlKind>> {
        if self.input_locked {
            return Err(Error::ExportInProgress);
        }
        self.input_locked = true;
        self.gestures.handle(PointerEvent::Cancel, 1.0);
        Ok(self
            .controls
            .iter_mut()
            .filter(|c| c.export_excluded && c.visible)
            .map(|c| {
                c.visible = false;
                c.kind
            })
            .collect())
    }

    pub fn end_export(&mut self, hidden: &[ControlKind]) {
        for control in &mut self.controls {
            if hidden.contains(&control.kind) {
                control.visible = true;
            }
        }
        self.input_locked = false;
    }

    /// What the user sees right now, placeholder and controls included.
    pub fn snapshot(&self) -> CompositionSnapshot {
        let text = self.engine.settings().text();
        CompositionSnapshot {
            design: self.design.clone(),
            layout: self.layout,
            photo: self.photo.as_ref().map(|p| Arc::clone(&p.image)),
            content: self.content_size(),
            offset: self.engine.settings().photo_offset(),
            scale: self.engine.settings().photo_scale(),
            text: text.to_owned(),
            font_style: self.engine.settings().font_style(),
            placeholder: text
                .is_empty()
                .then(|| self.design.placeholder.clone())
                .filter(|p| !p.is_empty()),
            overlays: self.overlays,
            controls: self
                .controls
                .iter()
                .filter(|c| c.visible)
                .map(|c| (c.kind, self.control_rect(c.kind)))
                .collect(),
            paper: self.design.paper_color,
        }
    }

    /// Frozen copy for export: no placeholder and an opaque paper background.
    pub fn export_snapshot(&self) -> CompositionSnapshot {
        let mut snapshot = self.snapshot();
        snapshot.placeholder = None;
        snapshot.controls.retain(|(kind, _)| {
            self.control(*kind).is_some_and(|c| !c.export_excluded)
        });
        if !snapshot.paper.is_opaque() {
            snapshot.paper = PAPER;
        }
        snapshot
    }

    pub fn control_rect(&self, kind: ControlKind) -> Rect {
        match kind {
            ControlKind::ResetTransform => self.layout.reset_control(),
            ControlKind::FontToggle => self.layout.font_toggle_control(),
        }
    }

    fn relayout(&mut self) {
        self.layout = FrameLayout::compute(
            self.design.size,
            self.design.padding,
            annotation_rows(self.engine.settings().text()),
            self.design.footer_lines.len(),
        );
        if self.photo.is_none() {
            return;
        }
        let container = self.layout.viewport.size();
        let content = self.content_size();
        if let Err(err) = self.engine.observe_geometry(container, content) {
            debug!(error = %err, "deferring bounds computation");
        }
    }

    fn rejects_input(&self, what: &str) -> bool {
        if self.input_locked {
            debug!(action = what, "input locked while exporting");
        }
        self.input_locked
    }
}

/// Immutable copy of a composition handed to the rasterizer.
#[derive(Debug, Clone)]
pub struct CompositionSnapshot {
    pub design: FrameDesign,
    pub layout: FrameLayout,
    pub photo: Option<Arc<RgbaImage>>,
    /// Photo size at scale 1 in logical pixels.
    pub content: Size,
    pub offset: Offset,
    pub scale: f32,
    pub text: String,
    pub font_style: FontStyle,
    pub placeholder: Option<String>,
    pub overlays: OverlayToggles,
    pub controls: Vec<(ControlKind, Rect)>,
    pub paper: HexColor,
}

impl CompositionSnapshot {
    /// Re-lays the frame out at a new logical size. The pan offset follows
    /// the viewport proportionally and is clamped against the new bounds.
    pub fn refit(&self, frame: Size) -> Self {
        let layout = FrameLayout::compute(
            frame,
            self.design.padding,
            self.layout.annotation_rows,
            self.design.footer_lines.len(),
        );
        let content = match &self.photo {
            Some(image) => {
                let natural = Size::new(image.width() as f32, image.height() as f32);
                fit_within(natural, layout.viewport.size())
            }
            None => Size::default(),
        };
        let ratio = if self.layout.viewport.width > 0.0 {
            layout.viewport.width / self.layout.viewport.width
        } else {
            1.0
        };
        let bounds = compute_bounds(layout.viewport.size(), content, self.scale);
        let controls = self
            .controls
            .iter()
            .map(|(kind, _)| {
                let rect = match kind {
                    ControlKind::ResetTransform => layout.reset_control(),
                    ControlKind::FontToggle => layout.font_toggle_control(),
                };
                (*kind, rect)
            })
            .collect();

        let mut design = self.design.clone();
        design.size = frame;
        Self {
            design,
            layout,
            content,
            offset: bounds.clamp(self.offset.scaled(ratio)),
            controls,
            ..self.clone()
        }
    }
}
