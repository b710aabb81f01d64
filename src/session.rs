//! Interactive warp session
//!
//! The session owns the source image, the corner geometry and the rendering
//! settings. It runs an explicit poll-and-dispatch loop against a
//! [`DisplaySurface`]: every pointer move during a drag is followed by a full
//! warp, compose and present before the next event is looked at.

use image::{Rgb, RgbImage};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Error;
use crate::geometry::GeometryStore;
use crate::input::{InputEffect, PointerEvent, PointerInputHandler};
use crate::render::Compositor;
use crate::transform::{warp, WarpSettings};

/// Events delivered by a display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Pointer(PointerEvent),
    /// Put the corners back on the image's own corners
    Reset,
    /// ESC (key code 27) or an equivalent close request
    Quit,
}

/// Where frames go and where input comes from
pub trait DisplaySurface {
    /// Pump pending platform events and return them in arrival order
    fn poll_events(&mut self) -> Vec<SessionEvent>;

    fn present(&mut self, frame: &RgbImage) -> Result<(), Error>;

    fn is_open(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Running,
    Terminated,
}

/// Warp timing, accumulated over the session
#[derive(Debug, Clone, Default)]
pub struct WarpStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl WarpStats {
    fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }

    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(self.total.div_f64(self.count as f64))
        }
    }
}

pub struct Session {
    source: RgbImage,
    geometry: GeometryStore,
    input: PointerInputHandler,
    compositor: Compositor,
    warp_settings: WarpSettings,
    poll_interval: Duration,
    state: SessionState,
    stats: WarpStats,
}

impl Session {
    pub fn new(source: RgbImage, config: &Config) -> Self {
        let geometry = GeometryStore::new(source.width(), source.height(), config.handles.hit_radius);

        Self {
            source,
            geometry,
            input: PointerInputHandler::new(),
            compositor: Compositor::from_config(&config.handles),
            warp_settings: WarpSettings {
                interpolation: config.warp.interpolation,
                background: Rgb(config.warp.background),
            },
            poll_interval: config.poll_interval(),
            state: SessionState::Init,
            stats: WarpStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn geometry(&self) -> &GeometryStore {
        &self.geometry
    }

    /// Present the unwarped source with handles and enter `Running`
    pub fn start<S: DisplaySurface>(&mut self, surface: &mut S) -> Result<(), Error> {
        self.present_idle(surface)?;
        self.state = SessionState::Running;
        info!(
            "Session running ({}x{}), drag a corner to warp, R to reset, ESC to quit",
            self.source.width(),
            self.source.height()
        );
        Ok(())
    }

    /// Handle one event to completion
    pub fn dispatch<S: DisplaySurface>(&mut self, event: SessionEvent, surface: &mut S) -> Result<(), Error> {
        match event {
            SessionEvent::Pointer(pointer) => {
                if self.input.handle(&mut self.geometry, pointer) == InputEffect::Redraw {
                    self.redraw_warped(surface)?;
                }
            }
            SessionEvent::Reset => {
                info!("Corners reset");
                self.geometry.reset();
                self.present_idle(surface)?;
            }
            SessionEvent::Quit => {
                info!("Quit requested");
                self.state = SessionState::Terminated;
            }
        }
        Ok(())
    }

    fn present_idle<S: DisplaySurface>(&mut self, surface: &mut S) -> Result<(), Error> {
        let frame = self.compositor.compose(&self.source, &self.geometry.corners());
        surface.present(&frame)
    }

    fn redraw_warped<S: DisplaySurface>(&mut self, surface: &mut S) -> Result<(), Error> {
        let corners = self.geometry.corners();

        let warp_start = Instant::now();
        let warped = warp(&self.source, &corners, &self.warp_settings);
        let elapsed = warp_start.elapsed();
        self.stats.record(elapsed);
        debug!("Time taken for warp perspective: {:.2} ms", elapsed.as_secs_f64() * 1000.0);

        let frame = self.compositor.compose(&warped, &corners);
        surface.present(&frame)
    }

    /// Run until a quit event or the surface closes
    pub fn run<S: DisplaySurface>(&mut self, surface: &mut S) -> Result<WarpStats, Error> {
        if self.state == SessionState::Init {
            self.start(surface)?;
        }

        while self.state == SessionState::Running {
            for event in surface.poll_events() {
                self.dispatch(event, surface)?;
                if self.state != SessionState::Running {
                    break;
                }
            }

            if self.state == SessionState::Running && !surface.is_open() {
                info!("Window closed");
                self.state = SessionState::Terminated;
            }

            if self.state == SessionState::Running && !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }

        match self.stats.average() {
            Some(avg) => info!(
                "Warp performance: {} warps, avg {:.2} ms, max {:.2} ms",
                self.stats.count,
                avg.as_secs_f64() * 1000.0,
                self.stats.max.as_secs_f64() * 1000.0
            ),
            None => info!("No warps performed"),
        }

        Ok(self.stats.clone())
    }
}
