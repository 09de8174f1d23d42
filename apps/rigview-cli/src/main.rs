use anyhow::Result;
use clap::{Parser, Subcommand};
use rigview_common::{DeviceClass, DeviceIndex, HMD_DEVICE_INDEX, MAX_TRACKED_DEVICES, RawPoseMatrix};
use rigview_models::{DeviceModels, HeadlessGpu, RenderModelCache};
use rigview_runtime::stub::{StubCompositor, StubLoader, StubSystem, sample_model};
use rigview_runtime::{DeviceEvent, DevicePose, LoadPolicy, TextureId, TrackingSystem};
use rigview_tracking::{EyeMatrices, FrameReport, PoseComposer};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rigview-cli", about = "Headless demo of the rigview tracking core")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and table sizing
    Info,
    /// Drive the full pipeline against the scripted stub runtime
    Run {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "90")]
        frames: u64,
        /// Emit frame reports as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
}

/// The whole application in one owned context: collaborators and bookkeeping
/// state, passed by reference into each operation. No ambient globals.
struct AppContext {
    system: StubSystem,
    compositor: StubCompositor,
    loader: StubLoader,
    gpu: HeadlessGpu,
    cache: RenderModelCache,
    slots: DeviceModels,
    composer: PoseComposer,
}

impl AppContext {
    /// Build the scripted rig: an HMD, two controllers sharing one model
    /// (differing only in name case), a base station, and one device whose
    /// model is deliberately missing to show failure containment.
    fn new() -> Result<Self> {
        let mut system = StubSystem::new();
        system.connect(HMD_DEVICE_INDEX, DeviceClass::Hmd, "generic_hmd");
        system.connect(DeviceIndex(3), DeviceClass::Controller, "vive_controller");
        system.connect(DeviceIndex(4), DeviceClass::Controller, "VIVE_CONTROLLER");
        system.connect(DeviceIndex(7), DeviceClass::TrackingReference, "base_station");
        system.connect(DeviceIndex(8), DeviceClass::GenericTracker, "missing_puck");

        let mut loader = StubLoader::with_latency(2);
        loader.insert_model("vive_controller", sample_model(TextureId(1)));
        loader.insert_model("base_station", sample_model(TextureId(2)));
        loader.insert_model("tracker_puck", sample_model(TextureId(3)));

        let mut compositor = StubCompositor::new();
        compositor.set_pose(
            HMD_DEVICE_INDEX,
            DevicePose::valid(RawPoseMatrix::from_translation(0.0, 1.6, 0.0)),
        );

        let composer = PoseComposer::new(EyeMatrices::from_system(&system, 0.1, 30.0)?);

        let mut ctx = Self {
            system,
            compositor,
            loader,
            gpu: HeadlessGpu::new(),
            cache: RenderModelCache::new(LoadPolicy::default()),
            slots: DeviceModels::new(),
            composer,
        };
        ctx.slots.setup_all(
            &ctx.system,
            &mut ctx.cache,
            &mut ctx.loader,
            &mut ctx.gpu,
        )?;
        Ok(ctx)
    }

    /// One frame: drain device events, sweep
    /// controller visibility, refresh poses, report.
    fn frame(&mut self) -> Result<Option<FrameReport>> {
        while let Some(event) = self.system.poll_event() {
            self.slots.handle_event(
                event,
                &self.system,
                &mut self.cache,
                &mut self.loader,
                &mut self.gpu,
            )?;
        }
        self.slots.refresh_visibility(&self.system);
        self.composer
            .refresh_poses(&mut self.compositor, &self.system)?;
        Ok(self.composer.frame_report())
    }

    /// Scripted tracking timeline for the demo run.
    fn script(&mut self, frame: u64) {
        match frame {
            // Controllers acquire tracking shortly after startup.
            10 => {
                for i in [3, 4] {
                    self.compositor.set_pose(
                        DeviceIndex(i),
                        DevicePose::valid(RawPoseMatrix::from_translation(
                            if i == 3 { -0.2 } else { 0.2 },
                            1.1,
                            -0.3,
                        )),
                    );
                }
                self.compositor.set_pose(
                    DeviceIndex(7),
                    DevicePose::valid(RawPoseMatrix::from_translation(0.0, 2.2, 1.5)),
                );
            }
            // A tracker puck connects mid-run.
            30 => {
                self.system
                    .connect(DeviceIndex(5), DeviceClass::GenericTracker, "tracker_puck");
                self.system.push_event(DeviceEvent::Activated(DeviceIndex(5)));
                self.compositor.set_pose(
                    DeviceIndex(5),
                    DevicePose::valid(RawPoseMatrix::from_translation(0.5, 0.1, 0.0)),
                );
            }
            // A held button hides controller 3 for a stretch of frames.
            50 => self.system.set_buttons(DeviceIndex(3), 0b1),
            60 => self.system.set_buttons(DeviceIndex(3), 0),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("rigview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("max tracked devices: {MAX_TRACKED_DEVICES}");
            println!("hmd device index: {HMD_DEVICE_INDEX}");
        }
        Commands::Run { frames, json } => {
            let mut ctx = AppContext::new()?;
            tracing::info!(
                models = ctx.cache.len(),
                renderable = ctx.slots.renderable().count(),
                "startup assignment complete"
            );

            for frame in 0..frames {
                ctx.script(frame);
                if let Some(report) = ctx.frame()? {
                    if json {
                        println!("{}", serde_json::to_string(&report)?);
                    } else {
                        println!("frame {frame}: {report}");
                    }
                }
            }

            let visible: Vec<u32> = ctx
                .slots
                .renderable()
                .map(|(device, _)| device.0)
                .collect();
            println!(
                "done: {} frames, {} cached models, visible devices {:?}",
                frames,
                ctx.cache.len(),
                visible
            );
        }
    }

    Ok(())
}
