// SuperK status readout
//
// Connects to the Fianium laser, the RF driver and the Select and prints
// what each of them reports.

use clap::Parser;
use superk_rs::mock::MockTransport;
use superk_rs::select::Crystal;
use superk_rs::{Bus, Fianium, InterbusTerminal, LabConfig, RegisterTransport, RfDriver, Select};

#[derive(Parser)]
#[command(name = "status")]
#[command(version = "1.0")]
#[command(about = "Print the state of a SuperK laser system")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = superk_rs::config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Use an in-memory system instead of the serial ports
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

    let config = LabConfig::load_from(&args.config)?;

    println!("SuperK Status");
    println!("=============\n");

    if args.simulate {
        report(&Bus::new(MockTransport::simulated_system("SIM0")), &config)
    } else {
        report(&Bus::new(InterbusTerminal::new(config.interbus.clone())), &config)
    }
}

fn report<T: RegisterTransport>(
    bus: &Bus<T>,
    config: &LabConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let laser = Fianium::connect(bus, config.ports.fianium.as_deref())?;
    let rf = RfDriver::connect(bus, config.ports.rf_driver.as_deref())?;
    let select = Select::connect(bus, config.ports.select.as_deref())?;

    println!("Fianium laser");
    if laser.session().is_bound() {
        println!("{}", laser.snapshot());
        match laser.system_status() {
            Ok(status) => println!("System status = {}", status),
            Err(e) => println!("System status unavailable: {}", e),
        }
    } else {
        println!("  not connected");
    }

    println!("\nRF driver");
    if rf.session().is_bound() {
        match rf.rf_power() {
            Ok(power) => println!("  {}", power),
            Err(e) => println!("  RF power unavailable: {}", e),
        }
        match rf.crystal_range() {
            Ok(range) => println!("  Crystal range: {}", range),
            Err(e) => println!("  Crystal range unavailable: {}", e),
        }
        match rf.crystal_temperature() {
            Ok(celsius) => println!("  Crystal temperature: {:.1} °C", celsius),
            Err(e) => println!("  Crystal temperature unavailable: {}", e),
        }
        match rf.connected_crystal() {
            Ok(Some(index)) => println!("  Connected crystal: {}", index),
            Ok(None) => println!("  No crystal connected"),
            Err(e) => println!("  Connected crystal unavailable: {}", e),
        }
    } else {
        println!("  not connected");
    }

    println!("\nSelect");
    if select.session().is_bound() {
        match select.rf_switch() {
            Ok(switch) => println!("  {}", switch),
            Err(e) => println!("  RF switch unavailable: {}", e),
        }
        for (name, crystal) in [("Crystal 1", Crystal::First), ("Crystal 2", Crystal::Second)] {
            match select.crystal_range(crystal) {
                Ok(range) => println!("  {}: {}", name, range),
                Err(e) => println!("  {} unavailable: {}", name, e),
            }
        }
    } else {
        println!("  not connected");
    }

    Ok(())
}
