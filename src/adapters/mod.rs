// ==========================================
// PAWS 木材供应仿真系统 - 外部适配层
// ==========================================
// 职责: 对接 ws3（上层规划）与 FHOPS（下层作业）
// 模式: import（进程内）/ cli（本地可执行文件 + JSON）
// ==========================================

pub mod cli_runner;
pub mod fhops;
pub mod ws3;

pub use cli_runner::{payload_failure, run_cli_json};
pub use fhops::{FhopsAgent, FHOPS_EXEC};
pub use ws3::{Ws3Emulator, WS3_EMULATOR};
