//! 页面设备抽象
//!
//! 提供镜像设备接口和页面级 I/O 操作。
//! page/device.rs 定义 [`ImageDevice`] 接口和带游标的 [`PageDev`] 包装器
//!
//! page/io.rs 提供整页读写：读取一页（chunk + spare），打包 tags 后写入一页，写入对象头页面
//!
//! page/mem.rs 和 page/file.rs 分别提供内存镜像和磁盘文件两种设备实现

mod device;
mod io;
mod mem;

#[cfg(feature = "std")]
mod file;

pub use device::{ImageDevice, PageDev};
pub use io::PageRead;
pub use mem::MemDevice;

#[cfg(feature = "std")]
pub use file::{FileDevice, OpenMode};
