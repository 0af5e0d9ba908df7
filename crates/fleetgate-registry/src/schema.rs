//! Table definitions for the registry database.
//!
//! `users` is owned by whoever provisions accounts; `node` is written by
//! the join and leave flows. Both are created only when the daemon is
//! configured with `create_schema = true`.

/// Accounts that own nodes. `password` holds a PHC-format hash.
pub const CREATE_USERS: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    username VARCHAR(64) NOT NULL UNIQUE,
    password VARCHAR(255) NOT NULL
)";

/// Joined nodes keyed by their cluster name.
pub const CREATE_NODE: &str = "\
CREATE TABLE IF NOT EXISTS node (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    name VARCHAR(63) NOT NULL UNIQUE,
    ip VARCHAR(45) NOT NULL,
    type INT NOT NULL DEFAULT 0,
    status INT NOT NULL DEFAULT 0,
    user_id BIGINT NOT NULL,
    num_cpu INT NOT NULL,
    size_mem DOUBLE NOT NULL,
    num_gpu INT NOT NULL DEFAULT 0,
    gpu_type VARCHAR(128) NOT NULL DEFAULT ''
)";

pub const SELECT_USER_ID: &str = "SELECT id FROM users WHERE username = ?";

pub const SELECT_PASSWORD_HASH: &str = "SELECT password FROM users WHERE username = ?";

pub const INSERT_NODE: &str = "\
INSERT INTO node (name, ip, type, status, user_id, num_cpu, size_mem, num_gpu, gpu_type)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";

pub const DELETE_NODE_BY_NAME: &str = "DELETE FROM node WHERE name = ?";
