//! Runs the spring-force simulation through the ping-pong loop and prints
//! every record after every iteration.

use std::path::Path;
use std::process::ExitCode;

use pingpong_compute::config::{is_spirv, resolve_kernel_path, USAGE};
use pingpong_compute::reference::seeded_points;
use pingpong_compute::{
    GpuContext, IterationDriver, Observer, Program, Record, Result, SimConfig, StreamCapture,
    TargetProfile,
};

fn load_program(
    context: &GpuContext,
    path: &Path,
    entry_point: &str,
    profile: TargetProfile,
    workgroup_size: u32,
) -> Result<Program> {
    let path = resolve_kernel_path(path)?;
    if is_spirv(&path) {
        Program::load(context, &path, entry_point, profile, workgroup_size)
    } else {
        Program::compile(context, &path, entry_point, profile, workgroup_size)
    }
}

/// One `[idx] ...` line per record, 1-based, then a blank line.
fn render_points(points: &[Record]) -> String {
    let mut out = String::new();
    for (idx, point) in points.iter().enumerate() {
        out.push_str(&format!("[{}] {point}\n", idx + 1));
    }
    out.push('\n');
    out
}

fn print_points(_iteration: usize, points: &[Record]) {
    print!("{}", render_points(points));
}

fn run_loop<O: Observer>(driver: &mut IterationDriver<'_, O>, iterations: usize) -> Result<()> {
    driver.run(iterations, print_points)
}

fn run(config: &SimConfig) -> Result<()> {
    let context = GpuContext::new_blocking()?;
    let program = match &config.kernel {
        Some(path) => load_program(
            &context,
            path,
            &config.entry_point,
            TargetProfile::Integrate,
            config.workgroup_size,
        )?,
        None => Program::integrate(&context)?,
    };
    let initial = seeded_points(config.count, config.seed);
    let driver = IterationDriver::new(&context, &program, &initial, config.params)?;

    if config.capture {
        let capture_program = match &config.capture_kernel {
            Some(path) => load_program(
                &context,
                path,
                pingpong_compute::program::CAPTURE_ENTRY,
                TargetProfile::Capture,
                config.workgroup_size,
            )?,
            None => Program::capture(&context)?,
        };
        let capture = StreamCapture::new(&context, capture_program, initial.len())?;
        let mut driver = driver.with_observer(capture);
        run_loop(&mut driver, config.iterations)?;
        let capture = driver.into_observer();
        println!(
            "Captured {} records over {} iterations",
            capture.captured().len(),
            capture.iterations()
        );
    } else {
        let mut driver = driver;
        run_loop(&mut driver, config.iterations)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let config = match SimConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}\n\n{USAGE}");
            return ExitCode::from(1);
        }
    };
    if config.help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_one_line_per_record_then_a_blank_line() {
        let points = [
            Record::at_rest([0.5, -0.25, 1.0]),
            Record {
                position: [0.0; 3],
                velocity: [0.125, 0.0, -2.0],
            },
        ];
        assert_eq!(
            render_points(&points),
            "[1] Position: (0.5000, -0.2500, 1.0000); Velocity: (0.0000, 0.0000, 0.0000)\n\
             [2] Position: (0.0000, 0.0000, 0.0000); Velocity: (0.1250, 0.0000, -2.0000)\n\
             \n"
        );
    }
}
