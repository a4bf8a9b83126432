pub mod guid;
pub mod hresult;

pub use guid::{Guid, IID_IAGILEOBJECT, IID_IINSPECTABLE, IID_IUNKNOWN};
pub use hresult::HResult;
