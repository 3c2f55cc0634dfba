//! Transport-level tests through the public API

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use vial_transport::mock::{MockDevice, MockReply};
use vial_transport::protocol::{cmd, REPORT_SIZE};
use vial_transport::{
    DeviceDiscovery, DiscoveredDevice, DiscoveryEvent, FirmwareKind, FlowControlTransport,
    HidDevice, PresenceMonitor, RetryPolicy, TransportDeviceInfo, TransportError,
};

struct FixedDiscovery {
    devices: Mutex<Vec<DiscoveredDevice>>,
}

impl DeviceDiscovery for FixedDiscovery {
    fn list_devices(&self) -> Result<Vec<DiscoveredDevice>, TransportError> {
        Ok(self.devices.lock().clone())
    }

    fn open_device(&self, device: &DiscoveredDevice) -> Result<Box<dyn HidDevice>, TransportError> {
        Err(TransportError::DeviceNotFound(device.info.device_path.clone()))
    }
}

fn keyboard(path: &str) -> DiscoveredDevice {
    DiscoveredDevice {
        info: TransportDeviceInfo {
            vid: 0xFEED,
            pid: 0x6060,
            kind: FirmwareKind::Vial,
            device_path: path.to_string(),
            manufacturer: None,
            product_name: Some("Test Board".to_string()),
        },
    }
}

#[test]
fn test_recovers_from_transient_faults() {
    let mock = MockDevice::echo();
    mock.push_fault(MockReply::ShortWrite);
    mock.push_fault(MockReply::WriteError);
    mock.push_fault(MockReply::NoResponse);
    mock.push_fault(MockReply::ShortRead);
    let transport =
        FlowControlTransport::with_policy(Box::new(mock.clone()), RetryPolicy::immediate(5));

    let resp = transport.send(&[cmd::GET_LAYER_COUNT, 7]).unwrap();
    assert_eq!(&resp[..2], &[cmd::GET_LAYER_COUNT, 7]);
    assert_eq!(mock.writes().len(), 5);
    assert!(mock
        .writes()
        .iter()
        .all(|w| w.len() == REPORT_SIZE + 1 && w[0] == 0));
}

#[test]
fn test_budget_exhaustion_is_hard_failure() {
    let mock = MockDevice::new(|_| MockReply::NoResponse);
    let transport =
        FlowControlTransport::with_policy(Box::new(mock.clone()), RetryPolicy::immediate(20));
    let err = transport.send(&[cmd::GET_PROTOCOL_VERSION]).unwrap_err();
    assert!(matches!(err, TransportError::Failed { attempts: 20 }));
    assert_eq!(mock.writes().len(), 20);
}

#[test]
fn test_presence_scan_skips_while_transaction_open() {
    let transport = FlowControlTransport::with_policy(
        Box::new(MockDevice::echo()),
        RetryPolicy::immediate(1),
    );
    let discovery = Arc::new(FixedDiscovery {
        devices: Mutex::new(vec![keyboard("/dev/hidraw0")]),
    });
    let monitor = PresenceMonitor::new(discovery, Duration::from_millis(5))
        .with_gate(Arc::clone(transport.gate()));
    let mut rx = monitor.subscribe();

    {
        let _guard = transport.begin_transaction();
        assert!(!monitor.poll_once().unwrap());
        assert!(rx.try_recv().is_err());
    }

    assert!(monitor.poll_once().unwrap());
    assert!(matches!(rx.try_recv(), Ok(DiscoveryEvent::DeviceAdded(_))));
}

#[test]
fn test_spawned_monitor_reports_hotplug() {
    let discovery = Arc::new(FixedDiscovery {
        devices: Mutex::new(Vec::new()),
    });
    let monitor = Arc::new(PresenceMonitor::new(
        discovery.clone(),
        Duration::from_millis(5),
    ));
    let mut rx = monitor.subscribe();
    let handle = monitor.spawn();

    discovery.devices.lock().push(keyboard("/dev/hidraw4"));

    let deadline = Instant::now() + Duration::from_secs(2);
    let event = loop {
        if let Ok(event) = rx.try_recv() {
            break Some(event);
        }
        if Instant::now() > deadline {
            break None;
        }
        std::thread::sleep(Duration::from_millis(5));
    };

    monitor.stop();
    handle.join().unwrap();
    assert!(!monitor.is_running());

    match event {
        Some(DiscoveryEvent::DeviceAdded(d)) => assert_eq!(d.info.device_path, "/dev/hidraw4"),
        other => panic!("expected DeviceAdded, got {other:?}"),
    }
}
