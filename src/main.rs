//! Headless canvas host (for testing purposes only)
//!
//! Runs the built-in reference producer without a browser: writes the
//! self-test scene, dumps offsets, header and painted operations as JSON, then
//! drives a short animation through a recording surface.
//!
//! Usage: `canvas-host [config.json] [frames]`

use std::process::ExitCode;

use canvas_host::{
    App, Color, FixedFrames, Frame, FrameInput, Host, HostConfig, NativeProducer, RecordingSurface,
    Result,
};

/// Ball drifting right of the pointer
#[derive(Default)]
struct Demo {
    tick: u32,
}

impl App for Demo {
    fn frame(&mut self, input: &FrameInput, frame: &mut Frame<'_>) -> Result<()> {
        self.tick += 1;
        frame.clear(Color::RayWhite);
        frame.rect(0.0, 400.0, 800.0, 50.0, Color::DarkGray);
        frame.circle(input.pointer_x + self.tick as f32 * 4.0, input.pointer_y, 20.0, Color::Purple);
        frame.line(0.0, 400.0, 800.0, 400.0, Color::Black);
        frame.text(10.0, 30.0, 20, Color::Black, &format!("frame {}", self.tick));
        Ok(())
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| canvas_host::HostError::Config(format!("{}: {}", path, e)))?;
            HostConfig::from_json(&json)?
        }
        None => HostConfig::default(),
    };
    let frames = args.next().and_then(|n| n.parse().ok()).unwrap_or(3);

    let mut host = Host::new(NativeProducer::new(Demo::default())?, &config)?;
    let mut surface = RecordingSurface::new(800.0, 450.0);

    let count = host.self_test()?;
    log::info!("self-test wrote {} commands at {}", count, host.cmd_buffer_ptr());

    let offsets: serde_json::Map<String, serde_json::Value> = host
        .offsets()
        .entries()
        .map(|(name, offset)| (name.to_string(), offset.into()))
        .collect();
    println!("{}", serde_json::to_string_pretty(&offsets)?);
    println!("{}", serde_json::to_string_pretty(&host.header()?)?);

    let views = host.views()?;
    canvas_host::FrameDispatcher::from_config(&config).replay(&views, &mut surface)?;
    println!("{}", serde_json::to_string_pretty(surface.ops())?);
    surface.take_ops();

    host.input_mut().pointer_moved(100.0, 200.0, (0.0, 0.0));
    let painted = host.run(&mut surface, &mut FixedFrames(frames))?;
    log::info!("painted {} frames, {} operations", painted, surface.ops().len());
    if let Some(diag) = host.diagnostics() {
        println!("{}", serde_json::to_string(&diag)?);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
