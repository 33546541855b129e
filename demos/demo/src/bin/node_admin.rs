//! Load config and start a paxos node with its trigger endpoint.
use std::{io::Read, net::SocketAddr, process::exit, time::Duration};

use clap::{App, Arg};
use demo::{boot_local_cluster, config::NodeConfig, propose_filter};
use log::{info, LevelFilter};
use px_bus::InMemoryBus;
use simplelog::{CombinedLogger, Config, WriteLogger};

fn main() {
    // Example:
    //  ./node_admin --config=./test-output/replica-0-config.yml
    //
    let matches = App::new("paxos-admin")
        .version("0.1.0")
        .about("start paxos node")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("Node config file (yaml). Defaults apply when omitted."),
        )
        .get_matches();

    let conf = match matches.value_of("config") {
        Some(path) => {
            let mut buf = String::with_capacity(1024);
            std::fs::File::open(path)
                .expect("can't open node config")
                .read_to_string(&mut buf)
                .expect("can't load node config");
            serde_yaml::from_str::<NodeConfig>(&buf).expect("invalid node config")
        }
        None => NodeConfig::default(),
    };

    let server_addr: SocketAddr = match conf.server_addr.parse() {
        Ok(addr) => addr,
        Err(_) => {
            println!("invalid server_addr: {}", conf.server_addr);
            exit(-1);
        }
    };

    let _ = CombinedLogger::init(vec![WriteLogger::new(
        LevelFilter::Debug,
        Config::default(),
        std::fs::File::create(format!("./paxos-{}.log", conf.node_name)).unwrap(),
    )]);

    info!("init paxos node: {}", conf.node_name);

    let deadline = Duration::from_millis(conf.cluster.propose_deadline_ms);

    tokio::runtime::Runtime::new().unwrap().block_on(async move {
        let bus = InMemoryBus::new();
        let nodes = match boot_local_cluster(
            &bus,
            conf.cluster.local_replicas,
            conf.cluster.total_acceptors,
            conf.cluster.max_retry,
        )
        .await
        {
            Ok(nodes) => nodes,
            Err(e) => {
                // no bus, no node.
                println!("startup failed: {}", e);
                exit(-1);
            }
        };

        let trigger = propose_filter(nodes[0].handle.clone(), deadline);
        warp::serve(trigger).run(server_addr).await;
    });
}
