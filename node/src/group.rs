use std::{env, str::FromStr};

use anyhow::{Context, ensure};
use comms::{Collective, SoloGroup, TcpGroup};
use log::info;

const DEFAULT_ROOT_ADDR: &str = "127.0.0.1:7070";

/// This process's place in the group, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEnv {
    pub rank: usize,
    pub world_size: usize,
    pub root_addr: String,
}

impl GroupEnv {
    /// Reads `RANK`, `WORLD_SIZE` and `ROOT_ADDR`, defaulting to a group of one.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let rank = parse_var(&lookup, "RANK", 0)?;
        let world_size = parse_var(&lookup, "WORLD_SIZE", 1)?;
        let root_addr = lookup("ROOT_ADDR").unwrap_or_else(|| DEFAULT_ROOT_ADDR.to_string());

        ensure!(world_size > 0, "WORLD_SIZE must be positive");
        ensure!(
            rank < world_size,
            "RANK {rank} is out of range for WORLD_SIZE {world_size}"
        );

        Ok(Self {
            rank,
            world_size,
            root_addr,
        })
    }

    /// Connects this process to the rest of the group, blocking until everyone joined.
    pub fn join(&self) -> anyhow::Result<Box<dyn Collective + Send>> {
        let Self {
            rank,
            world_size,
            root_addr,
        } = self;
        let (rank, world_size) = (*rank, *world_size);

        if world_size == 1 {
            return Ok(Box::new(SoloGroup));
        }

        let group = if rank == 0 {
            let rendezvous = TcpGroup::listen(root_addr.as_str(), world_size)
                .with_context(|| format!("cannot listen on {root_addr}"))?;
            info!(
                "waiting for {} processes on {}",
                world_size - 1,
                rendezvous.local_addr()?
            );
            rendezvous.accept()?
        } else {
            TcpGroup::connect(root_addr, rank, world_size)
                .with_context(|| format!("cannot join the group at {root_addr}"))?
        };

        Ok(Box::new(group))
    }
}

fn parse_var<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid {key} '{value}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn missing_variables_mean_a_group_of_one() {
        let env = GroupEnv::from_lookup(lookup(&[])).unwrap();

        assert_eq!(env.rank, 0);
        assert_eq!(env.world_size, 1);
        assert_eq!(env.root_addr, DEFAULT_ROOT_ADDR);
        assert_eq!(env.join().unwrap().size(), 1);
    }

    #[test]
    fn variables_are_parsed_and_checked() {
        let env = GroupEnv::from_lookup(lookup(&[
            ("RANK", "2"),
            ("WORLD_SIZE", " 4 "),
            ("ROOT_ADDR", "10.0.0.1:9000"),
        ]))
        .unwrap();
        assert_eq!(env.rank, 2);
        assert_eq!(env.world_size, 4);
        assert_eq!(env.root_addr, "10.0.0.1:9000");

        assert!(GroupEnv::from_lookup(lookup(&[("RANK", "4"), ("WORLD_SIZE", "4")])).is_err());
        assert!(GroupEnv::from_lookup(lookup(&[("WORLD_SIZE", "0")])).is_err());
        assert!(GroupEnv::from_lookup(lookup(&[("RANK", "one")])).is_err());
    }
}
