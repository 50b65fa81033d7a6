use daq_gateway::drivers::simulated::{Signal, SimulatedDriver};
use daq_gateway::drivers::traits::{DriverReading, EquipmentConfig, EquipmentDriver, TagRequest};
use daq_gateway::tags::structures::{quality_code, ValueVariant};

fn create_test_config() -> EquipmentConfig {
    EquipmentConfig {
        id: "sim1".to_string(),
        name: "Simulated equipment".to_string(),
        scan_rate_ms: 100,
        unavailable: vec!["constant:offline".to_string()],
    }
}

fn requests(addresses: &[&str]) -> Vec<TagRequest> {
    addresses
        .iter()
        .map(|a| TagRequest {
            address: a.to_string(),
        })
        .collect()
}

fn value_of(reading: &DriverReading) -> &ValueVariant {
    match reading {
        DriverReading::Value { value, .. } => value,
        other => panic!("expected a value, got {:?}", other),
    }
}

#[test]
fn signal_addresses_are_parsed() {
    assert_eq!(
        "sine:10:60000".parse::<Signal>(),
        Ok(Signal::Sine {
            amplitude: 10.0,
            period_ms: 60000.0
        })
    );
    assert_eq!("ramp:0.5".parse::<Signal>(), Ok(Signal::Ramp { step: 0.5 }));
    assert_eq!("counter".parse::<Signal>(), Ok(Signal::Counter));
    assert_eq!("toggle".parse::<Signal>(), Ok(Signal::Toggle));
    assert_eq!(
        "constant:42".parse::<Signal>(),
        Ok(Signal::Constant(ValueVariant::Int(42)))
    );
    assert_eq!(
        "constant:AUTO".parse::<Signal>(),
        Ok(Signal::Constant(ValueVariant::String("AUTO".into())))
    );
    assert_eq!(
        "noisy:80:0.2".parse::<Signal>(),
        Ok(Signal::Noisy { base: 80.0, jitter: 0.2 })
    );

    assert!("sine:10".parse::<Signal>().is_err());
    assert!("ramp:fast".parse::<Signal>().is_err());
    assert!("square:1".parse::<Signal>().is_err());
    assert!("constant".parse::<Signal>().is_err());
}

#[tokio::test]
async fn test_connection_lifecycle() {
    let driver = SimulatedDriver::new(create_test_config());
    assert_eq!(driver.kind(), "simulated");
    assert_eq!(driver.config().id, "sim1");
    assert!(driver.check_status().await.is_err());

    driver.connect().await.unwrap();
    assert!(driver.check_status().await.is_ok());

    driver.disconnect().await.unwrap();
    assert!(driver.check_status().await.is_err());
}

#[tokio::test]
async fn test_read_requires_connection() {
    let driver = SimulatedDriver::new(create_test_config());
    assert!(driver.read_tags(&requests(&["counter"])).await.is_err());
}

#[tokio::test]
async fn test_read_signals() {
    let driver = SimulatedDriver::new(create_test_config());
    driver.connect().await.unwrap();
    let batch = requests(&["counter", "toggle", "ramp:0.5", "constant:1.5", "noisy:80:0.2"]);

    let first = driver.read_tags(&batch).await.unwrap();
    assert_eq!(first.len(), 5);
    assert_eq!(value_of(&first["counter"]), &ValueVariant::Int(1));
    assert_eq!(value_of(&first["toggle"]), &ValueVariant::Bool(true));
    assert_eq!(value_of(&first["ramp:0.5"]), &ValueVariant::Float(0.5));
    assert_eq!(value_of(&first["constant:1.5"]), &ValueVariant::Float(1.5));
    let noisy = value_of(&first["noisy:80:0.2"]).as_f64().unwrap();
    assert!((79.7..=80.3).contains(&noisy));

    let second = driver.read_tags(&batch).await.unwrap();
    assert_eq!(value_of(&second["counter"]), &ValueVariant::Int(2));
    assert_eq!(value_of(&second["toggle"]), &ValueVariant::Bool(false));
    assert_eq!(value_of(&second["ramp:0.5"]), &ValueVariant::Float(1.0));
}

#[tokio::test]
async fn test_sine_stays_within_amplitude() {
    let driver = SimulatedDriver::new(create_test_config());
    driver.connect().await.unwrap();
    for _ in 0..10 {
        let result = driver.read_tags(&requests(&["sine:5:100"])).await.unwrap();
        let v = value_of(&result["sine:5:100"]).as_f64().unwrap();
        assert!(v.abs() <= 5.0);
    }
}

#[tokio::test]
async fn test_invalid_readings() {
    let driver = SimulatedDriver::new(create_test_config());
    driver.connect().await.unwrap();
    let result = driver
        .read_tags(&requests(&["constant:offline", "bogus:1"]))
        .await
        .unwrap();

    assert!(matches!(
        &result["constant:offline"],
        DriverReading::Invalid { quality_code: code, .. } if *code == quality_code::DATA_UNAVAILABLE
    ));
    assert!(matches!(
        &result["bogus:1"],
        DriverReading::Invalid { quality_code: code, .. } if *code == quality_code::INCORRECT_NATIVE_ADDRESS
    ));
}

#[tokio::test]
async fn test_concurrent_reads_get_distinct_ticks() {
    let driver = SimulatedDriver::new(create_test_config());
    driver.connect().await.unwrap();
    let batch = requests(&["counter"]);

    let results = futures::future::join_all((0..5).map(|_| driver.read_tags(&batch))).await;
    let mut ticks: Vec<i64> = results
        .iter()
        .map(|r| match value_of(&r.as_ref().unwrap()["counter"]) {
            ValueVariant::Int(i) => *i,
            other => panic!("unexpected counter value {:?}", other),
        })
        .collect();
    ticks.sort_unstable();
    assert_eq!(ticks, vec![1, 2, 3, 4, 5]);
}
