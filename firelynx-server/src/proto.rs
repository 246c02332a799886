//! Generated protobuf types for the wire schema and the control-plane
//! RPC surface.
//!
//! The module tree mirrors the proto package structure so that
//! cross-package references inside the generated code resolve.

pub mod firelynx {
    pub mod settings {
        pub mod v1 {
            tonic::include_proto!("firelynx.settings.v1");
        }
    }

    pub mod control {
        pub mod v1 {
            tonic::include_proto!("firelynx.control.v1");
        }
    }
}

pub use firelynx::control::v1 as control;
pub use firelynx::settings::v1 as settings;
