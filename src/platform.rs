/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Executable memory allocation (component 5's platform half), grounded on
//! the reference `CodePage`/`WinPage` pair: POSIX `mmap`/`munmap` on Unix,
//! `VirtualAlloc`/`VirtualFree` on Windows.

use crate::errors::AssemblyError;

/// A raw RWX (allocate-then-protect, per platform) mapping. Owns its region
/// and unmaps it on drop; never `Clone` since double-unmapping would be
/// undefined behavior.
pub struct ExecutableRegion {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the mapping is not thread-affine; concurrent reads of the mapped
// bytes (once written and before being called) are sound, and the type
// carries no interior mutability a second thread could race against after
// `CodePage::compile` finishes writing.
unsafe impl Send for ExecutableRegion {}
unsafe impl Sync for ExecutableRegion {}

impl ExecutableRegion {
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `code` into the region. The caller must not have called
    /// [`function_ptr`](Self::as_mut_ptr)-derived functions concurrently.
    pub fn write(&mut self, code: &[u8]) -> Result<(), AssemblyError> {
        if code.len() > self.len {
            return Err(AssemblyError::RegionOverflow { needed: code.len(), capacity: self.len });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), self.ptr, code.len());
        }
        Ok(())
    }
}

#[cfg(unix)]
mod imp {
    use super::*;

    pub fn allocate(size: usize) -> Result<ExecutableRegion, AssemblyError> {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        let rounded = size.div_ceil(page_size).max(1) * page_size;
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                rounded,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(AssemblyError::PageAllocation {
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        Ok(ExecutableRegion { ptr: ptr as *mut u8, len: rounded })
    }

    pub fn free(region: &ExecutableRegion) {
        unsafe {
            libc::munmap(region.ptr as *mut libc::c_void, region.len);
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::*;
    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READWRITE,
    };

    pub fn allocate(size: usize) -> Result<ExecutableRegion, AssemblyError> {
        let size = size.max(1);
        let ptr = unsafe {
            VirtualAlloc(std::ptr::null(), size, MEM_COMMIT | MEM_RESERVE, PAGE_EXECUTE_READWRITE)
        };
        if ptr.is_null() {
            return Err(AssemblyError::PageAllocation { reason: "VirtualAlloc failed".into() });
        }
        Ok(ExecutableRegion { ptr: ptr as *mut u8, len: size })
    }

    pub fn free(region: &ExecutableRegion) {
        unsafe {
            VirtualFree(region.ptr as *mut _, 0, MEM_RELEASE);
        }
    }
}

pub fn allocate(size: usize) -> Result<ExecutableRegion, AssemblyError> {
    imp::allocate(size)
}

impl Drop for ExecutableRegion {
    fn drop(&mut self) {
        imp::free(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_write() {
        let mut region = allocate(64).unwrap();
        assert!(region.len() >= 64);
        region.write(&[0xc3]).unwrap();
    }

    #[test]
    fn write_overflow_errors() {
        let mut region = allocate(1).unwrap();
        let big = vec![0u8; region.len() + 1];
        assert!(region.write(&big).is_err());
    }
}
