mod redis;

pub use self::redis::RedisRemoteCache;
