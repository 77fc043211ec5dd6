//! Shared setup: a device over the software driver, with the concrete
//! driver handle kept around for counters and fault injection.

use std::sync::Arc;

use vitric_driver::software::{SoftwareDevice, SoftwareFactory, SoftwareOptions};
use vitric_gpu::{Device, DeviceConfig};

pub fn device_with(
    options: SoftwareOptions,
    config: &DeviceConfig,
) -> (Device, Arc<SoftwareDevice>) {
    // Surface core logs under --nocapture; repeated init attempts are fine.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let factory = SoftwareFactory::new(options);
    let device = Device::create(&factory, config).expect("device creation");
    let driver = factory.last_created().expect("factory created a device");
    (device, driver)
}

pub fn device() -> (Device, Arc<SoftwareDevice>) {
    device_with(SoftwareOptions::default(), &DeviceConfig::default())
}
