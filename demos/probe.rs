#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use btusb::config::Config;
use btusb::dev::{Device, InterfaceFilter};
use btusb::host::{Direction, TransferType, Usb, UsbDevice};
use btusb::vendor::Chip;

#[derive(Clone, Debug, clap::Parser)]
struct Args {
    /// Vendor ID of the Bluetooth USB device.
    #[arg(short, long, value_parser=hex16)]
    vid: Option<u16>,

    /// Product ID of the Bluetooth USB device.
    #[arg(short, long, value_parser=hex16)]
    pid: Option<u16>,

    /// Switch the controller out of bootloader mode.
    #[arg(short, long)]
    switch: bool,

    /// Broadcom HCD patch to download.
    #[arg(long)]
    patch: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let usb = Usb::new()?;
    let (Some(vid), Some(pid)) = (args.vid, args.pid) else {
        println!("Bluetooth devices (pass '<VID>:<PID>' to '--vid' and '--pid' options):");
        for d in usb.devices()? {
            let chip = Chip::detect(d.vendor_id(), d.product_id());
            if d.is_bluetooth() || chip != Chip::Unknown {
                println!("{d} {:04X}:{:04X} {chip:?}", d.vendor_id(), d.product_id());
            }
        }
        return Ok(());
    };
    let cfg = Config::per_user("btusb")?;
    let mut dev = Device::with_config(Arc::new(usb.open_first(vid, pid)?), cfg)?;
    dev.open()?;
    describe(&dev)?;
    let chip = Chip::detect(vid, pid);
    info!("Controller family: {chip:?}");
    if args.switch {
        mode_switch(&dev, chip)?;
    }
    if let Some(path) = args.patch {
        let fw = std::fs::read(&path).with_context(|| format!("failed to read {path:?}"))?;
        let mut ifc = (dev.find_interface(&InterfaceFilter::BLUETOOTH)?)
            .context("no Bluetooth interface")?;
        ifc.open()?;
        let evt = (ifc.find_pipe(TransferType::Interrupt, Direction::In))
            .context("no event endpoint")?;
        dev.bcm_download_patch(&evt, &fw)?;
        println!("Patch downloaded");
    }
    Ok(())
}

fn describe(dev: &Device<UsbDevice>) -> Result<()> {
    let d = dev.descriptor();
    println!("Device {:04X}:{:04X} release {:#06X}", d.vendor_id, d.product_id, d.device_release);
    for (name, i) in [
        ("Manufacturer", dev.manufacturer_string_index()),
        ("Product", dev.product_string_index()),
        ("Serial", dev.serial_number_string_index()),
    ] {
        if i != 0 {
            println!("  {name}: {}", dev.string(i).unwrap_or_else(|e| format!("<{e}>")));
        }
    }
    println!("  Status: {:?}", dev.device_status()?);
    let cfg = dev.active_configuration_descriptor()?;
    println!("  Configuration {} ({} interface(s))", cfg.value, cfg.num_interfaces);
    for ifc in &cfg.interfaces {
        println!(
            "    Interface {} alt {}: {:02X}/{:02X}/{:02X}",
            ifc.number, ifc.alt_setting, ifc.class, ifc.subclass, ifc.protocol
        );
        for ep in &ifc.endpoints {
            println!(
                "      Endpoint {:#04X} {:?} {:?} max packet {}",
                ep.address,
                ep.direction(),
                ep.transfer_type(),
                ep.max_packet_size
            );
        }
    }
    let Some(mut ifc) = dev.find_interface(&InterfaceFilter::BLUETOOTH)? else {
        println!("  No Bluetooth interface (bootloader mode?)");
        return Ok(());
    };
    ifc.open()?;
    let evt = (ifc.find_pipe(TransferType::Interrupt, Direction::In))
        .context("no event endpoint")?;
    let v = dev.read_local_version_info(&evt)?;
    println!(
        "  HCI {}.{:#06X} LMP {}.{:#06X} {}",
        v.hci_version, v.hci_subversion, v.lmp_version, v.lmp_subversion, v.company_id
    );
    Ok(())
}

fn mode_switch(dev: &Device<UsbDevice>, chip: Chip) -> Result<()> {
    match chip {
        Chip::Atheros => {
            if let Ok(v) = dev.qca_version() {
                let info = v.device_info()?;
                println!("QCA {v:?}: rampatch {} {info:?}", v.rampatch_name());
            }
            if dev.ath3k_set_normal_mode()? {
                println!("Switched to normal mode");
            }
        }
        Chip::Broadcom => dev.bcm_wakeup()?,
        Chip::Intel => dev.intel_reset(&btusb::vendor::IntelReset::NORMAL)?,
        _ => bail!("no mode switch for this controller"),
    }
    Ok(())
}

fn hex16(mut s: &str) -> Result<u16, String> {
    if s.starts_with("0x") || s.starts_with("0X") {
        s = &s[2..];
    }
    u16::from_str_radix(s, 16).map_err(|e| format!("{e}"))
}
