use rpmb_storage::simulated::DEFAULT_IMAGE_SIZE;
use rpmb_storage::{DeviceError, FileSimulatedRpmb, RpmbError, RpmbKey, RpmbStorage, StorageConfig};

#[test]
fn test_state_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let image = dir.path().join("rpmb.img");
    FileSimulatedRpmb::create(&image, DEFAULT_IMAGE_SIZE as u64)?;

    let config = StorageConfig::simulated(Some(image.clone()));
    {
        let mut storage = RpmbStorage::from_config(&config, None)?;
        storage.write_device_state(2)?;
        storage.write_rollback_index(200, 77)?;
    }

    let mut storage = RpmbStorage::from_config(&config, None)?;
    assert_eq!(storage.read_device_state()?, 2);
    assert_eq!(storage.read_rollback_index(200)?, 77);
    assert_eq!(storage.read_rollback_index(199)?, 0);
    Ok(())
}

#[test]
fn test_missing_image_is_unpartitioned() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let image = dir.path().join("absent.img");

    let json = format!(r#"{{"backend":"simulated","simulated_image":{:?}}}"#, image);
    let config = StorageConfig::from_json_str(&json)?;
    let mut storage = RpmbStorage::from_config(&config, None)?;

    // Writes are accepted without creating the partition
    storage.write_device_state(1)?;
    storage.write_rollback_index(3, 5)?;
    assert!(!image.exists());

    assert!(matches!(storage.read_device_state(), Err(RpmbError::NotFound)));
    assert_eq!(storage.read_rollback_index(3)?, 0);
    Ok(())
}

#[test]
fn test_provisioning_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let image = dir.path().join("rpmb.img");
    FileSimulatedRpmb::create(&image, DEFAULT_IMAGE_SIZE as u64)?;

    let config = StorageConfig::simulated(Some(image.clone()));
    {
        let mut storage = RpmbStorage::from_config(&config, None)?;
        assert!(!storage.is_provisioned());
        storage.program_key(&RpmbKey::new([0x5C; 32]))?;
        storage.write_rollback_index(4, 17)?;
    }

    let mut storage = RpmbStorage::from_config(&config, None)?;
    assert_eq!(storage.read_rollback_index(4)?, 17);
    assert!(storage.is_provisioned());
    Ok(())
}

#[test]
fn test_unreadable_image_is_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    // A directory where the image should be: opens fail with an I/O error
    let image = dir.path().join("rpmb.img");
    std::fs::create_dir(&image)?;

    let mut storage = RpmbStorage::from_config(&StorageConfig::simulated(Some(image)), None)?;

    assert!(matches!(
        storage.write_device_state(1),
        Err(RpmbError::Io(DeviceError::Io(_)))
    ));
    assert!(matches!(
        storage.write_rollback_index(2, 3),
        Err(RpmbError::Io(DeviceError::Io(_)))
    ));
    assert!(matches!(
        storage.read_rollback_index(2),
        Err(RpmbError::Io(DeviceError::Io(_)))
    ));
    assert!(storage.write_rollback_index(2, 3).unwrap_err().is_fatal());
    Ok(())
}
