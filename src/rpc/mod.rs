// RPC - Boundary with the consensus layer
// Inbound calls served over HTTP, outbound packets streamed to consensus

pub mod client;
pub mod gateway;
pub mod server;
pub mod types;

pub use client::{ConsensusLink, HttpConsensusLink, LinkError};
pub use gateway::{ConsensusGateway, GatewayError};
pub use server::{RpcConfig, RpcServer, RpcServerError, RpcServerHandle};
pub use types::{
    CommitBlockResponse, ExecBlock, Packet, PacketType, ProtoTransaction, Request, SubmitResult,
    TransactionType, VerifyResult,
};
