// feedcore-sdk: foundation layer shared by the manager and worker binaries.
// Has zero dependencies on the other feedcore crates.

pub mod build_info;
pub mod trace;

pub use build_info::PackageInfo;
pub use trace::TraceWriter;
