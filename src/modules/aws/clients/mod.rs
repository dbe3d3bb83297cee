pub mod iam;
pub mod lambda;
pub mod s3;
pub mod traits;

pub use iam::IamService;
pub use lambda::LambdaService;
pub use s3::S3Service;
pub use traits::*;
