use anyhow::{anyhow, bail, Context, Result};
use photocamera::testing::SimulatedBackend;
use photocamera::{Camera, CaptureBackend, PhotoCameraConfig, Point};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    photocamera::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: photocamera-cli <command> [args] [--config <path>] [--json]");
        eprintln!("Commands: info, devices, capture, zoom, toggle, switch, focus, demo");
        std::process::exit(1);
    }

    let options = Options::parse(&args[2..])?;
    let command = args[1].as_str();
    match command {
        "info" => cmd_info(&options),
        "devices" => cmd_devices(&options),
        "capture" => cmd_capture(&options).await,
        "zoom" => cmd_zoom(&options).await,
        "toggle" => cmd_toggle(&options).await,
        "switch" => cmd_switch(&options).await,
        "focus" => cmd_focus(&options).await,
        "demo" => cmd_demo(&options).await,
        _ => {
            eprintln!("Unknown command: {}", command);
            std::process::exit(1);
        }
    }
}

struct Options {
    config: PhotoCameraConfig,
    json: bool,
    output: Option<PathBuf>,
    smooth_ms: Option<u64>,
    times: usize,
    positional: Vec<String>,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut config_path = None;
        let mut options = Options {
            config: PhotoCameraConfig::default(),
            json: false,
            output: None,
            smooth_ms: None,
            times: 1,
            positional: Vec::new(),
        };

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--json" => options.json = true,
                "--front" => options.config.session.prefer_front_camera = true,
                "--config" => {
                    i += 1;
                    config_path = Some(value(args, i, "--config")?.to_string());
                }
                "--output" => {
                    i += 1;
                    options.output = Some(PathBuf::from(value(args, i, "--output")?));
                }
                "--smooth" => {
                    i += 1;
                    options.smooth_ms = Some(value(args, i, "--smooth")?.parse()?);
                }
                "--times" => {
                    i += 1;
                    options.times = value(args, i, "--times")?.parse()?;
                }
                other => options.positional.push(other.to_string()),
            }
            i += 1;
        }

        if let Some(path) = config_path {
            let prefer_front = options.config.session.prefer_front_camera;
            options.config = PhotoCameraConfig::load_from_file(&path)
                .with_context(|| format!("loading config from {}", path))?;
            options.config.session.prefer_front_camera |= prefer_front;
        }
        Ok(options)
    }

    fn number(&self, index: usize, name: &str) -> Result<f64> {
        self.positional
            .get(index)
            .ok_or_else(|| anyhow!("{} required", name))?
            .parse()
            .with_context(|| format!("invalid {}", name))
    }
}

fn value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

async fn started_camera(options: &Options) -> Result<Camera> {
    let backend: Arc<dyn CaptureBackend> = Arc::new(SimulatedBackend::with_standard_devices());
    let camera = Camera::new(backend, options.config.clone());
    camera.start().await.context("starting camera")?;
    Ok(camera)
}

fn cmd_info(options: &Options) -> Result<()> {
    let info = photocamera::get_info();
    if options.json {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!("{} {}", info.name, info.version);
        println!("{}", info.description);
        println!("native backend: {}", info.native_backend);
    }
    Ok(())
}

fn cmd_devices(options: &Options) -> Result<()> {
    let backend: Arc<dyn CaptureBackend> = Arc::new(SimulatedBackend::with_standard_devices());
    let camera = Camera::new(backend, options.config.clone());
    let devices = camera.devices();
    if options.json {
        println!("{}", serde_json::to_string(&devices)?);
    } else {
        for d in devices {
            println!(
                "{}: {} ({}) zoom {}-{}x",
                d.id, d.name, d.position, d.capabilities.min_zoom_factor, d.capabilities.max_zoom_factor
            );
        }
    }
    Ok(())
}

async fn cmd_capture(options: &Options) -> Result<()> {
    let camera = started_camera(options).await?;
    let photo = camera.capture_photo().await?;

    if let Some(path) = &options.output {
        photo
            .upright()
            .save(path)
            .with_context(|| format!("saving photo to {}", path.display()))?;
    }

    if options.json {
        println!(
            "{}",
            serde_json::json!({
                "id": photo.request_id,
                "width": photo.width(),
                "height": photo.height(),
                "orientation": photo.orientation,
                "captured_at": photo.captured_at,
                "saved_to": options.output,
            })
        );
    } else {
        println!(
            "Photo {}: {}x{} {:?}",
            photo.request_id,
            photo.width(),
            photo.height(),
            photo.orientation
        );
        if let Some(path) = &options.output {
            println!("Saved upright photo to {}", path.display());
        }
    }
    Ok(())
}

async fn cmd_zoom(options: &Options) -> Result<()> {
    let factor = options.number(0, "zoom factor")? as f32;
    let camera = started_camera(options).await?;

    let applied = match options.smooth_ms {
        Some(ms) => camera.smooth_zoom(factor, Duration::from_millis(ms)).await?,
        None => camera.set_zoom(factor).await?,
    };
    print_zoom(options, &camera, applied).await
}

async fn cmd_toggle(options: &Options) -> Result<()> {
    let camera = started_camera(options).await?;
    let mut applied = camera.zoom_state().await.current;
    for _ in 0..options.times {
        applied = camera.toggle_optical_zoom().await?;
        if !options.json {
            println!("Zoom: {}x", applied);
        }
    }
    print_zoom(options, &camera, applied).await
}

async fn print_zoom(options: &Options, camera: &Camera, applied: f32) -> Result<()> {
    let state = camera.zoom_state().await;
    if options.json {
        println!("{}", serde_json::to_string(&state)?);
    } else {
        println!(
            "Zoom {}x (range {}-{}x, stops {:?})",
            applied, state.min, state.max, state.available
        );
    }
    Ok(())
}

async fn cmd_switch(options: &Options) -> Result<()> {
    let camera = started_camera(options).await?;
    for _ in 0..options.times {
        let device = camera
            .switch_video_devices()
            .await
            .ok_or_else(|| anyhow!("no active camera after switching"))?;
        if options.json {
            println!("{}", serde_json::to_string(&device)?);
        } else {
            println!("Active camera: {} ({})", device.name, device.position);
        }
    }
    Ok(())
}

async fn cmd_focus(options: &Options) -> Result<()> {
    let point = Point::new(options.number(0, "x")?, options.number(1, "y")?);
    let camera = started_camera(options).await?;
    camera.focus_and_expose(point).await;
    println!("Focused at ({:.2}, {:.2})", point.x, point.y);
    Ok(())
}

async fn cmd_demo(options: &Options) -> Result<()> {
    let camera = started_camera(options).await?;
    let mut activity = camera.subscribe_activity();

    let device = camera
        .current_device()
        .await
        .ok_or_else(|| anyhow!("camera started without a device"))?;
    println!("Running on {} ({})", device.name, device.position);

    camera.focus_and_expose(Point::new(0.3, 0.6)).await;
    println!("Tap to focus at (0.30, 0.60)");

    for _ in 0..3 {
        let factor = camera.toggle_optical_zoom().await?;
        println!("Optical zoom: {}x", factor);
    }

    let photo = camera.capture_photo().await?;
    println!("Captured {}x{} ({:?})", photo.width(), photo.height(), photo.orientation);
    while let Ok(event) = activity.try_recv() {
        log::debug!("Activity: {:?}", event);
    }

    if let Some(path) = &options.output {
        photo.upright().save(path)?;
        println!("Saved upright photo to {}", path.display());
    }

    let switched = camera
        .switch_video_devices()
        .await
        .ok_or_else(|| anyhow!("no active camera after switching"))?;
    if switched.same_device(&device) {
        bail!("camera did not switch away from {}", device.name);
    }
    println!("Switched to {} ({})", switched.name, switched.position);
    println!("Status: {}", camera.status());
    Ok(())
}
