pub(super) const ROOT_LONG_ABOUT: &str = "\
Inspect, render and bulk-provision znodes of a ZooKeeper ensemble

zkcli opens one session with the ensemble given by --target, performs the selected
--action, and closes the session again, also when interrupted with SIGINT or SIGTERM.

ACTIONS:

  get      Print the payload of --znode.
  stats    Print the metadata (zxids, times, versions, sizes) of --znode.
  set      Create --znode if missing (including its ancestors) and store a JSON payload
           taken from --values or from the file given by --input.
  deploy   Create or update every znode listed in the mapping file given by --input.
  tree     Render --znode (default /) and all of its descendants.
  del      Delete --znode and all of its descendants. The root cannot be deleted.
  list     List the immediate children of --znode.
  status   Send the 'ruok' health check; prints OK when the server answers 'imok'.

JSON PAYLOADS:

  Payloads written by set and deploy are validated as JSON and stored in one canonical
  form: object keys sorted, four spaces of indentation. Deploying the same file twice
  therefore stores byte-identical values.

DEPLOY MAPPING FILES:

  One entry per line in the form <znode>:<file>. Only the first ':' separates the two,
  so file names may contain colons. Lines starting with '#' are comments and blank lines
  are ignored. Relative file paths are resolved against the mapping file's directory.

    # service configuration
    /app/config/db:db.json
    /app/config/cache:/etc/app/cache.json

  Deployment happens in two phases. First every line is parsed and every referenced file
  is checked to be readable; if any check fails, all problems are reported and nothing is
  written. Then the entries are applied in file order. An entry whose payload is not valid
  JSON, or which the server rejects, is reported and skipped while the remaining entries
  are still applied.

CONFIGURATION:

  --config <FILE> names a TOML file with defaults:

    target = \"zk1:2181,zk2:2181\"
    timeout_secs = 10

  Command line flags take precedence over the file.

EXIT CODES:

  0: Success
  1: Any reported error, including failed deploy entries and an unhealthy status
  2: Invalid command line
  128+N: Terminated by signal N

EXAMPLES:

  $ zkcli -t zk:2181 -a tree
  $ zkcli -a set -z /app/flags -v '{\"beta\": true}'
  $ zkcli -a deploy -i deploy/mapping.txt --verbose
  $ zkcli -a status || echo 'ZooKeeper unhealthy'
";
