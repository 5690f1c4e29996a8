use crate::block::UefiBlockDevice;
use crate::file_system;
use alloc::string::String;
use alloc::vec::Vec;
use android_loader::{Storage, StorageError};

/// The boot volume and the firmware's block devices.
pub struct UefiStorage;

impl Storage for UefiStorage {
    fn list_dir(&mut self, dir: &str) -> Result<Vec<String>, StorageError> {
        file_system::list_files(dir)
    }

    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, StorageError> {
        file_system::read_file(path)
    }

    fn read_device(&mut self, device: &str) -> Result<Vec<u8>, StorageError> {
        UefiBlockDevice::open(device)?.read_all()
    }
}
