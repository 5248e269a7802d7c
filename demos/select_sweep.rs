// SuperK Select wavelength sweep
//
// Sets up the RF driver and Select for a wavelength range, turns the laser on
// and steps channel 1 through the range for a number of cycles.

use clap::Parser;
use std::time::Duration;
use superk_rs::mock::MockTransport;
use superk_rs::{
    Bus, Fianium, InterbusTerminal, LabConfig, ModuleError, RegisterTransport, RfDriver, Select,
};

#[derive(Parser)]
#[command(name = "select_sweep")]
#[command(version = "1.0")]
#[command(about = "Sweep the SuperK Select through a wavelength range")]
struct Args {
    /// Lowest wavelength in nm
    #[arg(long, default_value_t = 600.0)]
    min_nm: f64,

    /// Highest wavelength in nm
    #[arg(long, default_value_t = 700.0)]
    max_nm: f64,

    /// Step between wavelengths in nm
    #[arg(long, default_value_t = 20.0)]
    step_nm: f64,

    /// Dwell time at each wavelength in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    dwell_ms: u64,

    /// Number of passes through the range
    #[arg(short, long, default_value_t = 1)]
    cycles: u32,

    /// Laser power in percent
    #[arg(short, long, default_value_t = 100.0)]
    power: f64,

    /// Configuration file
    #[arg(long, default_value = superk_rs::config::DEFAULT_CONFIG_PATH)]
    config: String,

    #[arg(long, help = "Run against a simulated laser, RF driver and Select")]
    simulate: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    if !(args.step_nm > 0.0 && args.min_nm <= args.max_nm) {
        eprintln!("Need min_nm <= max_nm and a positive step_nm");
        std::process::exit(1);
    }

    let config = LabConfig::load_from(&args.config)?;

    println!("SuperK Select Sweep");
    println!("===================");
    println!("Range: {} nm - {} nm in {} nm steps", args.min_nm, args.max_nm, args.step_nm);
    println!("Cycles: {}\n", args.cycles);

    if args.simulate {
        sweep(&Bus::new(MockTransport::simulated_system("SIM0")), &config, &args)
    } else {
        sweep(&Bus::new(InterbusTerminal::new(config.interbus.clone())), &config, &args)
    }
}

fn sweep<T: RegisterTransport>(
    bus: &Bus<T>,
    config: &LabConfig,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error>> {
    let laser = Fianium::connect(bus, config.ports.fianium.as_deref())?
        .with_safety_notice(|message| println!("WARNING: {}", message));
    let rf = RfDriver::connect(bus, config.ports.rf_driver.as_deref())?;
    let select = Select::connect(bus, config.ports.select.as_deref())?;

    // The RF driver is off while the switch moves
    match select.route_for_range(&rf, args.min_nm, args.max_nm)? {
        Some(range) => println!("Select is ready for use. Crystal range: {}", range),
        None => {
            return Err(format!(
                "{} nm - {} nm is outside both crystals. Check the selection",
                args.min_nm, args.max_nm
            )
            .into())
        }
    }

    rf.set_amplitude_channel(1, 100.0)?;
    rf.set_rf_power(true)?;

    laser.set_power(args.power)?;
    println!("Fianium laser set to {}%.", laser.power_level()?);
    laser.set_emission(true)?;

    let stepped = step_through(&rf, args);

    // Always leave the system dark, whatever happened during the sweep
    let rf_off = rf.set_rf_power(false);
    let laser_off = laser.set_emission(false);

    stepped?;
    rf_off?;
    laser_off?;
    println!("\nSweep finished, RF driver and laser off.");
    Ok(())
}

fn step_through<T: RegisterTransport>(rf: &RfDriver<T>, args: &Args) -> Result<(), ModuleError> {
    let dwell = Duration::from_millis(args.dwell_ms);
    let steps = ((args.max_nm - args.min_nm) / args.step_nm).floor() as u32;

    for cycle in 1..=args.cycles {
        println!("\nCycle {}/{}", cycle, args.cycles);
        for step in 0..=steps {
            let wavelength = args.min_nm + f64::from(step) * args.step_nm;
            rf.set_wavelength_channel(1, wavelength)?;
            println!(
                "channel 1: {:.1} nm at {:.1} %",
                rf.wavelength_channel(1)?,
                rf.amplitude_channel(1)?
            );
            std::thread::sleep(dwell);
        }
    }
    Ok(())
}
