//! A reusable behaviour suite for [`Bucket`](crate::bucket::Bucket)
//! implementations, plus an in-memory service to run it against.

pub mod clock;
pub mod fake;
pub mod registry;
pub mod suites;

pub use clock::{Clock, RealClock, SimulatedClock};
pub use fake::FakeGcs;
pub use registry::{BucketTestDeps, Registry, Report, SuiteBuilder, TestFunction, TestSuite};
pub use suites::bucket_test_registry;
