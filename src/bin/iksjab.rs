/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::env;
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use iksclient::ClientCertificate;
use iksclient::ClientEvent;
use iksclient::Jid;
use iksclient::XmppClient;

const PASSWORD_VARIABLE: &str = "IKSJAB_PASSWORD";

fn print_version() {
    println!("iksjab (iksclient) v{}", iksclient::VERSION);
}

fn print_usage() {
    println!(concat!(
        "Usage: iksjab [OPTIONS]\n",
        "This tool can communicate over XMPP.\n",
        "Options:\n",
        "  -j, --jid <JID>            Jabber ID\n",
        "  -s, --server <HOST[:PORT]> Connect to this server instead of the JID's domain\n",
        "  -c, --cert <FILE>          PEM client certificate for SASL EXTERNAL\n",
        "  -k, --key <FILE>           PEM private key of the client certificate\n",
        "      --no-tls               Do not use STARTTLS\n",
        "  -t, --timeout <SECONDS>    Connection timeout\n",
        "  -m, --message <JID> <TEXT> Send a message and disconnect\n",
        "  -d, --debug                Log the XML traffic\n",
        "  -h, --help                 Display this help message and exit\n",
        "  -v, --version              Display the version and exit\n",
        "The password is read from the IKSJAB_PASSWORD environment variable,\n",
        "or asked for when the server requests it.\n",
        "Report issues at https://github.com/meduketto/iksemel-rust/issues"
    ));
}

struct Options {
    jid: Option<Jid>,
    server: Option<String>,
    cert_file: Option<String>,
    key_file: Option<String>,
    tls: bool,
    timeout: Option<Duration>,
    message: Option<(Jid, String)>,
    debug: bool,
}

enum Parsed {
    Run(Options),
    Exit(ExitCode),
}

fn next_value(args: &mut env::Args, arg: &str, what: &str) -> Result<String, String> {
    args.next()
        .ok_or_else(|| format!("{what} expected after {arg}"))
}

fn parse_jid(value: &str) -> Result<Jid, String> {
    Jid::new(value).map_err(|err| err.to_string())
}

fn parse_args() -> Result<Parsed, String> {
    let mut args = env::args();
    let mut options = Options {
        jid: None,
        server: None,
        cert_file: None,
        key_file: None,
        tls: true,
        timeout: None,
        message: None,
        debug: false,
    };

    // Skip the first argument (program name)
    args.next();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-j" | "--jid" => {
                let value = next_value(&mut args, &arg, "Jabber ID")?;
                options.jid = Some(parse_jid(&value)?);
            }
            "-s" | "--server" => {
                options.server = Some(next_value(&mut args, &arg, "Server")?);
            }
            "-c" | "--cert" => {
                options.cert_file = Some(next_value(&mut args, &arg, "Certificate file")?);
            }
            "-k" | "--key" => {
                options.key_file = Some(next_value(&mut args, &arg, "Key file")?);
            }
            "--no-tls" => options.tls = false,
            "-t" | "--timeout" => {
                let value = next_value(&mut args, &arg, "Seconds")?;
                let seconds = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid timeout: {value}"))?;
                options.timeout = Some(Duration::from_secs(seconds));
            }
            "-m" | "--message" => {
                let to = parse_jid(&next_value(&mut args, &arg, "Recipient")?)?;
                let text = next_value(&mut args, &arg, "Message text")?;
                options.message = Some((to, text));
            }
            "-d" | "--debug" => options.debug = true,
            "-h" | "--help" => {
                print_usage();
                return Ok(Parsed::Exit(ExitCode::SUCCESS));
            }
            "-v" | "--version" => {
                print_version();
                return Ok(Parsed::Exit(ExitCode::SUCCESS));
            }
            _ => return Err(format!("unknown option {arg}")),
        }
    }
    Ok(Parsed::Run(options))
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "iksclient=trace" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Message(message) => {
            let from = message.attribute("from").unwrap_or("server");
            match message.find_tag("body") {
                Some(body) => println!("{from}: {}", body.cdata()),
                None => println!("{message}"),
            }
        }
        ClientEvent::Presence(presence) => println!("{presence}"),
        ClientEvent::Iq(iq) => println!("{}", iq.to_element()),
        _ => {}
    }
}

fn run(jid: Jid, options: Options) -> Result<(), Box<dyn Error>> {
    let mut builder = XmppClient::build(jid)
        .server(options.server)
        .tls(options.tls);
    if let Some(timeout) = options.timeout {
        builder = builder.connection_timeout(timeout);
    }
    if let Ok(password) = env::var(PASSWORD_VARIABLE) {
        builder = builder.password(&password);
    }
    match (&options.cert_file, &options.key_file) {
        (Some(cert_file), Some(key_file)) => {
            builder = builder.certificate(ClientCertificate::from_pem_files(cert_file, key_file)?);
        }
        (None, None) => {}
        _ => {
            return Err("both --cert and --key are needed".into());
        }
    }

    let mut client = builder.connect()?;
    let mut message = options.message;
    loop {
        let event = client.wait_for_event()?;
        match event {
            ClientEvent::Connected => {
                println!("Connected as {}", client.jid());
                match message.take() {
                    Some((to, text)) => {
                        client.send_message(&to, &text)?;
                        client.disconnect();
                    }
                    None => client.send_presence()?,
                }
            }
            ClientEvent::NeedCredentials => {
                let password = rpassword::prompt_password("Password: ")?;
                client.send_credentials(&password)?;
            }
            ClientEvent::Disconnected => return Ok(()),
            event => print_event(&event),
        }
    }
}

fn main() -> ExitCode {
    let mut options = match parse_args() {
        Ok(Parsed::Run(options)) => options,
        Ok(Parsed::Exit(code)) => return code,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let Some(jid) = options.jid.take() else {
        eprintln!("Error: Jabber ID is required, see --help");
        return ExitCode::FAILURE;
    };
    init_logging(options.debug);

    match run(jid, options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
